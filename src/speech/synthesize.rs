use crate::audio::wav::pcm16_bytes_to_f32;
use crate::{NatterError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Longest text the synthesis service accepts in one request
pub const MAX_SPEECH_INPUT_CHARS: usize = 3000;

pub const DEFAULT_VOICE: &str = "Danielle";
pub const DEFAULT_ENGINE: &str = "neural";

const DEFAULT_SPEECH_URL: &str = "http://localhost:9400";

/// Configuration for the speech synthesis service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub voice_id: String,
    pub engine: String,
    pub output_format: String,
    pub sample_rate_hz: u32,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SPEECH_URL.to_string(),
            auth_token: None,
            voice_id: DEFAULT_VOICE.to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            output_format: "pcm".to_string(),
            sample_rate_hz: 22050,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("voice_id", &self.voice_id)
            .field("engine", &self.engine)
            .field("output_format", &self.output_format)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    engine: &'a str,
    output_format: &'a str,
    sample_rate_hz: u32,
}

/// Raw synthesized audio plus the rate it was rendered at
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub data: Vec<u8>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the PCM payload into f32 samples for playback
    pub fn to_samples(&self) -> Vec<f32> {
        pcm16_bytes_to_f32(&self.data)
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (self.data.len() / 2) as f32 / self.sample_rate as f32
    }
}

/// HTTP client for the neural speech synthesis API
pub struct SpeechClient {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NatterError::SpeechError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate_hz
    }

    /// Render text as raw little-endian 16-bit PCM.
    ///
    /// Whitespace-only text produces empty audio without a service call.
    pub async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let text = text.trim();

        if text.is_empty() {
            debug!("Skipping synthesis of empty text");
            return Ok(SynthesizedAudio {
                data: Vec::new(),
                sample_rate: self.config.sample_rate_hz,
            });
        }

        if text.chars().count() > MAX_SPEECH_INPUT_CHARS {
            return Err(NatterError::SpeechError(format!(
                "Text is {} chars, exceeding the {} char synthesis limit",
                text.chars().count(),
                MAX_SPEECH_INPUT_CHARS
            )));
        }

        let url = format!("{}/v1/speech", self.config.base_url.trim_end_matches('/'));
        let body = SynthesizeRequest {
            text,
            voice_id: &self.config.voice_id,
            engine: &self.config.engine,
            output_format: &self.config.output_format,
            sample_rate_hz: self.config.sample_rate_hz,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NatterError::SpeechError(format!("Synthesis request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NatterError::SpeechError(format!(
                "Synthesis failed with status {}",
                response.status()
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| NatterError::SpeechError(format!("Failed to read synthesis response: {}", e)))?
            .to_vec();

        let audio = SynthesizedAudio {
            data,
            sample_rate: self.config.sample_rate_hz,
        };

        info!(
            "Synthesized {:.1}s of speech with voice {}",
            audio.duration_secs(),
            self.config.voice_id
        );
        Ok(audio)
    }
}
