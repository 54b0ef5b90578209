use crate::transcribe::types::{StartJobRequest, TranscriptDocument, TranscriptionJob};
use crate::{NatterError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_TRANSCRIBE_URL: &str = "http://localhost:9100";

/// Configuration for the cloud transcription service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub language_code: String,
    pub sample_rate_hz: u32,
    pub media_format: String,
    pub timeout_secs: u64,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRANSCRIBE_URL.to_string(),
            auth_token: None,
            language_code: "en-US".to_string(),
            sample_rate_hz: 16000,
            media_format: "wav".to_string(),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for TranscribeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscribeConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("language_code", &self.language_code)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .field("media_format", &self.media_format)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl TranscribeConfig {
    /// WebSocket endpoint for streaming transcription, derived from the
    /// HTTP base URL
    pub fn stream_url(&self) -> String {
        let ws_base = if self.base_url.starts_with("https://") {
            self.base_url.replacen("https://", "wss://", 1)
        } else {
            self.base_url.replacen("http://", "ws://", 1)
        };
        format!("{}/v1/stream", ws_base.trim_end_matches('/'))
    }
}

/// HTTP client for the batch transcription API
pub struct TranscribeClient {
    client: reqwest::Client,
    config: TranscribeConfig,
}

impl TranscribeClient {
    pub fn new(config: TranscribeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NatterError::TranscribeError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TranscribeConfig {
        &self.config
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Submit a new batch job for the staged media
    pub async fn start_job(&self, job_name: &str, media_uri: &str) -> Result<TranscriptionJob> {
        let url = format!("{}/v1/transcriptions", self.config.base_url.trim_end_matches('/'));
        let body = StartJobRequest {
            job_name: job_name.to_string(),
            media_uri: media_uri.to_string(),
            language_code: self.config.language_code.clone(),
            media_format: self.config.media_format.clone(),
            sample_rate_hz: self.config.sample_rate_hz,
        };

        debug!("Starting transcription job {} for {}", job_name, media_uri);

        let response = self
            .apply_auth(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Start job request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NatterError::TranscribeError(format!(
                "Start job failed with status {}",
                response.status()
            )));
        }

        let job: TranscriptionJob = response
            .json()
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Invalid job response: {}", e)))?;

        info!("Started transcription job {} ({})", job.job_name, job.status.as_str());
        Ok(job)
    }

    /// Fetch the current state of a job
    pub async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob> {
        let url = format!(
            "{}/v1/transcriptions/{}",
            self.config.base_url.trim_end_matches('/'),
            job_name
        );

        let response = self
            .apply_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Get job request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NatterError::TranscribeError(format!(
                "Get job failed with status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Invalid job response: {}", e)))
    }

    /// Download the transcript document a completed job points at
    pub async fn fetch_transcript(&self, transcript_uri: &str) -> Result<TranscriptDocument> {
        debug!("Fetching transcript from {}", transcript_uri);

        let response = self
            .apply_auth(self.client.get(transcript_uri))
            .send()
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Transcript request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NatterError::TranscribeError(format!(
                "Transcript fetch failed with status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Invalid transcript document: {}", e)))
    }

    /// Remove a finished job from the service
    pub async fn delete_job(&self, job_name: &str) -> Result<()> {
        let url = format!(
            "{}/v1/transcriptions/{}",
            self.config.base_url.trim_end_matches('/'),
            job_name
        );

        let response = self
            .apply_auth(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Delete job request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NatterError::TranscribeError(format!(
                "Delete job failed with status {}",
                response.status()
            )));
        }

        debug!("Deleted transcription job {}", job_name);
        Ok(())
    }
}
