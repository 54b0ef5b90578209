use crate::{NatterError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Largest WAV payload the staging service accepts
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_STAGING_URL: &str = "http://localhost:9200";

/// Configuration for the media staging service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    pub max_upload_bytes: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STAGING_URL.to_string(),
            auth_token: None,
            timeout_secs: 30,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl std::fmt::Debug for StagingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct PutMediaResponse {
    uri: String,
}

/// Client for staging recorded audio where the transcription service can
/// fetch it
pub struct MediaStore {
    client: reqwest::Client,
    config: StagingConfig,
}

impl MediaStore {
    pub fn new(config: StagingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NatterError::StagingError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Upload a WAV payload under `key`, returning the URI the transcription
    /// service should read it from
    pub async fn put_audio(&self, key: &str, wav_bytes: &[u8]) -> Result<String> {
        if wav_bytes.len() > self.config.max_upload_bytes {
            return Err(NatterError::StagingError(format!(
                "Audio payload is {} bytes, exceeding the {} byte upload limit",
                wav_bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let url = format!("{}/media/{}", self.config.base_url.trim_end_matches('/'), key);
        debug!("Uploading {} bytes to {}", wav_bytes.len(), url);

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav_bytes.to_vec());

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NatterError::StagingError(format!("Upload request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NatterError::StagingError(format!(
                "Upload failed with status {}",
                response.status()
            )));
        }

        let body: PutMediaResponse = response
            .json()
            .await
            .map_err(|e| NatterError::StagingError(format!("Invalid upload response: {}", e)))?;

        info!("Staged audio as {}", body.uri);
        Ok(body.uri)
    }
}
