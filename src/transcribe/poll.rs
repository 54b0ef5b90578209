use crate::transcribe::client::TranscribeClient;
use crate::transcribe::types::TranscriptionJob;
use crate::{NatterError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Granularity at which a poll sleep re-checks the cancel flag
const CANCEL_SLICE: Duration = Duration::from_millis(50);

/// Polling schedule for batch transcription jobs.
///
/// The delay starts at `interval_ms`, grows by `backoff` after every
/// non-terminal status, and is clamped to `max_interval_ms`. The whole poll
/// gives up after `max_wait_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub backoff: f64,
    pub max_interval_ms: u64,
    pub max_wait_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            backoff: 1.5,
            max_interval_ms: 10000,
            max_wait_secs: 120,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(NatterError::ConfigError("Poll interval must be positive".into()));
        }
        if self.backoff < 1.0 {
            return Err(NatterError::ConfigError("Poll backoff must be at least 1.0".into()));
        }
        if self.max_interval_ms < self.interval_ms {
            return Err(NatterError::ConfigError(
                "Poll max interval must not be below the initial interval".into(),
            ));
        }
        if self.max_wait_secs == 0 {
            return Err(NatterError::ConfigError("Poll max wait must be positive".into()));
        }
        Ok(())
    }
}

/// How a bounded poll ended
#[derive(Debug)]
pub enum PollOutcome {
    /// The job reached Completed or Failed
    Terminal(TranscriptionJob),
    /// The wait budget ran out before the job finished
    TimedOut,
    /// The cancel flag was raised mid-poll
    Cancelled,
}

/// Poll a job until it reaches a terminal status, the wait budget runs out,
/// or `cancel` is raised.
///
/// `on_update` is called with every status observation, including the
/// terminal one.
pub async fn poll_until_terminal(
    client: &TranscribeClient,
    job_name: &str,
    config: &PollConfig,
    cancel: &AtomicBool,
    mut on_update: impl FnMut(&TranscriptionJob),
) -> Result<PollOutcome> {
    let started = Instant::now();
    let mut delay = config.interval();

    loop {
        if cancel.load(Ordering::SeqCst) {
            debug!("Poll of job {} cancelled", job_name);
            return Ok(PollOutcome::Cancelled);
        }

        let job = client.get_job(job_name).await?;
        on_update(&job);

        if job.status.is_terminal() {
            debug!(
                "Job {} reached {} after {:?}",
                job_name,
                job.status.as_str(),
                started.elapsed()
            );
            return Ok(PollOutcome::Terminal(job));
        }

        if started.elapsed() + delay > config.max_wait() {
            warn!(
                "Job {} still {} after {:?}, giving up",
                job_name,
                job.status.as_str(),
                started.elapsed()
            );
            return Ok(PollOutcome::TimedOut);
        }

        if !sleep_with_cancel(delay, cancel).await {
            debug!("Poll of job {} cancelled during sleep", job_name);
            return Ok(PollOutcome::Cancelled);
        }

        delay = next_delay(delay, config);
    }
}

/// Compute the next poll delay, clamped to the configured maximum
fn next_delay(current: Duration, config: &PollConfig) -> Duration {
    current.mul_f64(config.backoff).min(config.max_interval())
}

/// Sleep for `total`, waking early if `cancel` is raised.
///
/// Returns false when the sleep was interrupted by cancellation.
async fn sleep_with_cancel(total: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;

    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }

        tokio::time::sleep(remaining.min(CANCEL_SLICE)).await;
    }
}
