use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a transcription job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are final; everything else keeps the poller going
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// A transcription job record as reported by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionJob {
    pub job_name: String,
    pub status: JobStatus,
    pub media_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The finished transcript fetched from a completed job's transcript URI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub job_name: String,
    pub language_code: String,
    pub text: String,
}

/// Request body for starting a batch transcription job
#[derive(Debug, Serialize)]
pub struct StartJobRequest {
    pub job_name: String,
    pub media_uri: String,
    pub language_code: String,
    pub media_format: String,
    pub sample_rate_hz: u32,
}
