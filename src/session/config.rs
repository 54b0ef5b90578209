use crate::answer::AnswerConfig;
use crate::speech::SpeechConfig;
use crate::staging::StagingConfig;
use crate::transcribe::{PollConfig, TranscribeConfig};
use crate::{NatterError, Result};
use serde::{Deserialize, Serialize};

/// How captured speech reaches the transcription service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscribeMode {
    /// Stage the whole utterance, submit a job, poll for the result
    Batch,
    /// Stream audio over a WebSocket while recording
    Streaming,
}

/// Top-level configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub staging: StagingConfig,
    pub transcribe: TranscribeConfig,
    pub poll: PollConfig,
    pub answer: AnswerConfig,
    pub speech: SpeechConfig,

    pub transcribe_mode: TranscribeMode,

    /// Whether the session expects live microphone capture
    pub enable_audio_input: bool,

    /// Whether synthesized answers are played back
    pub enable_audio_output: bool,

    /// Rate of the samples arriving on the audio channel. The console
    /// binary overrides this with the capture device rate.
    pub input_sample_rate: u32,

    /// Longest utterance kept in the recording buffer
    pub max_utterance_secs: u32,

    /// Spoken when transcription comes back failed or empty
    pub apology_text: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            staging: StagingConfig::default(),
            transcribe: TranscribeConfig::default(),
            poll: PollConfig::default(),
            answer: AnswerConfig::default(),
            speech: SpeechConfig::default(),
            transcribe_mode: TranscribeMode::Batch,
            enable_audio_input: true,
            enable_audio_output: true,
            input_sample_rate: 16000,
            max_utterance_secs: 30,
            apology_text: "Sorry, I didn't catch that. Could you say it again?".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn without_audio_input(mut self) -> Self {
        self.enable_audio_input = false;
        self
    }

    pub fn without_audio_output(mut self) -> Self {
        self.enable_audio_output = false;
        self
    }

    pub fn with_streaming(mut self) -> Self {
        self.transcribe_mode = TranscribeMode::Streaming;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.poll.validate()?;

        if self.input_sample_rate == 0 {
            return Err(NatterError::ConfigError("Input sample rate must be positive".into()));
        }

        if self.max_utterance_secs == 0 {
            return Err(NatterError::ConfigError("Max utterance length must be positive".into()));
        }

        if self.apology_text.trim().is_empty() {
            return Err(NatterError::ConfigError("Apology text must not be empty".into()));
        }

        Ok(())
    }
}
