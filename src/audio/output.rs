use crate::{NatterError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Speaker playback driven by a shared mono sample queue.
///
/// `enqueue` appends samples at the device rate; the stream callback drains
/// them, upmixing to the device channel count and padding with silence when
/// the queue runs dry.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    queue: Arc<Mutex<VecDeque<f32>>>,
}

impl AudioOutput {
    /// Create a new audio output with the default output device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| NatterError::AudioDeviceError("No output device available".into()))?;

        info!("Using output device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));

        let supported = device
            .default_output_config()
            .map_err(|e| NatterError::AudioDeviceError(format!("Failed to get output config: {}", e)))?;

        let sample_format = supported.sample_format();
        let config = supported.config();

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            queue: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    /// Get the sample rate of the output device
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Get the number of channels
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Build and start the playback stream
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            warn!("Output stream already running");
            return Ok(());
        }

        if self.sample_format != SampleFormat::F32 {
            return Err(NatterError::AudioDeviceError(format!(
                "Unsupported output sample format: {:?}",
                self.sample_format
            )));
        }

        let channels = self.config.channels as usize;
        let queue = Arc::clone(&self.queue);

        let err_fn = |err| {
            error!("Audio output stream error: {}", err);
        };

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = queue.lock();
                    for frame in data.chunks_mut(channels) {
                        let sample = queue.pop_front().unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| NatterError::AudioDeviceError(format!("Failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| NatterError::AudioDeviceError(format!("Failed to start output stream: {}", e)))?;

        self.stream = Some(stream);

        info!("Output stream started ({} Hz, {} channels)", self.sample_rate(), channels);
        Ok(())
    }

    /// Append mono samples (at the device sample rate) to the playback queue
    pub fn enqueue(&self, samples: &[f32]) {
        self.queue.lock().extend(samples.iter().copied());
    }

    /// Number of samples waiting to be played
    pub fn pending_samples(&self) -> usize {
        self.queue.lock().len()
    }

    /// Check whether the playback queue has drained
    pub fn is_idle(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drop any queued samples without playing them
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Tear down the playback stream
    pub fn stop(&mut self) -> Result<()> {
        self.clear();

        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("Output stream stopped");
        }

        Ok(())
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_output_creation() {
        // This test might fail in CI environments without audio devices
        if let Ok(output) = AudioOutput::new() {
            assert!(output.sample_rate() > 0);
            assert!(output.channels() > 0);
            assert!(output.is_idle());
        }
    }

    #[test]
    fn test_queue_accounting() {
        if let Ok(output) = AudioOutput::new() {
            output.enqueue(&[0.1, 0.2, 0.3]);
            assert_eq!(output.pending_samples(), 3);
            assert!(!output.is_idle());

            output.clear();
            assert!(output.is_idle());
        }
    }
}
