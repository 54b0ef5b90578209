use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;

/// Bounded accumulator for one utterance.
///
/// Overflow drops the oldest samples, so a capture that runs past the
/// configured cap keeps the most recent audio.
pub struct RecordingBuffer {
    buffer: Arc<Mutex<HeapRb<f32>>>,
    sample_rate: u32,
}

impl RecordingBuffer {
    /// Create a buffer with the given capacity in samples
    pub fn new(capacity: usize, sample_rate: u32) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(HeapRb::new(capacity))),
            sample_rate,
        }
    }

    /// Create a buffer sized for `seconds` of audio at `sample_rate`
    pub fn for_duration(seconds: u32, sample_rate: u32) -> Self {
        Self::new((seconds * sample_rate) as usize, sample_rate)
    }

    /// Write samples to the buffer
    /// Returns the number of samples actually written
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let mut buffer = self.buffer.lock();
        let mut written = 0;

        for &sample in samples {
            if buffer.try_push(sample).is_ok() {
                written += 1;
            } else {
                // Buffer is full, drop old samples
                let _ = buffer.try_pop();
                let _ = buffer.try_push(sample);
                written += 1;
            }
        }

        written
    }

    /// Drain the whole utterance out of the buffer
    pub fn take_all(&mut self) -> Vec<f32> {
        let mut buffer = self.buffer.lock();
        let mut samples = Vec::with_capacity(buffer.occupied_len());

        while let Some(sample) = buffer.try_pop() {
            samples.push(sample);
        }

        samples
    }

    /// Get the number of samples available
    pub fn len(&self) -> usize {
        self.buffer.lock().occupied_len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.lock().clear();
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity().get()
    }

    /// Duration of the buffered audio in seconds
    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }
}

impl Clone for RecordingBuffer {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            sample_rate: self.sample_rate,
        }
    }
}
