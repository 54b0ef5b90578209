//! Wall-clock timing for per-stage turn metadata.
//!
//! The session worker times each exchange stage (transcription, answer,
//! synthesis) and records the result in the latency fields of
//! [`TurnMeta`](crate::messages::TurnMeta).

use std::time::{Duration, Instant};

/// Measures wall-clock time from a fixed starting point.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch(Instant);

impl Stopwatch {
    /// Begin timing now.
    pub fn start() -> Self {
        Self(Instant::now())
    }

    /// Time elapsed since [`start`](Self::start).
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    /// Elapsed time truncated to whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_tracks_wall_clock() {
        let sw = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(15));

        assert!(sw.elapsed() >= Duration::from_millis(15));
        assert!(sw.elapsed_ms() >= 15);
    }

    #[test]
    fn test_copies_share_the_origin() {
        let sw = Stopwatch::start();
        let before = sw.elapsed();
        let copy = sw;

        assert!(copy.elapsed() >= before);
    }
}
