use crate::{NatterError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

const CHUNK_SIZE: usize = 1024;

/// Mono sinc resampler for moving audio between device and service rates
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            2.0,
            params,
            CHUNK_SIZE,
            1,
        )
        .map_err(|e| NatterError::AudioProcessingError(format!("Failed to create resampler: {}", e)))?;

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Resample a mono buffer, padding the final partial chunk with silence
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let mut output = Vec::with_capacity((input.len() as f64 * ratio) as usize + CHUNK_SIZE);

        for chunk in input.chunks(CHUNK_SIZE) {
            let valid = chunk.len();

            let frames = if valid == CHUNK_SIZE {
                self.resampler
                    .process(&[chunk], None)
                    .map_err(|e| NatterError::AudioProcessingError(format!("Resampling failed: {}", e)))?
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(CHUNK_SIZE, 0.0);
                let mut frames = self
                    .resampler
                    .process(&[padded], None)
                    .map_err(|e| NatterError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
                // Keep only the portion that corresponds to real input
                let keep = (valid as f64 * ratio).round() as usize;
                let keep = keep.min(frames[0].len());
                frames[0].truncate(keep);
                frames
            };

            output.extend_from_slice(&frames[0]);
        }

        debug!(
            "Resampled {} samples at {} Hz to {} samples at {} Hz",
            input.len(),
            self.input_rate,
            output.len(),
            self.output_rate
        );

        Ok(output)
    }
}

/// One-shot resample of a mono buffer between two rates
pub fn resample_audio(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }

    let mut resampler = AudioResampler::new(input_rate, output_rate)?;
    resampler.process(input)
}
