pub mod answer;
pub mod audio;
pub mod messages;
pub mod session;
pub mod speech;
pub mod staging;
pub mod transcribe;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum NatterError {
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Media staging error: {0}")]
    StagingError(String),

    #[error("Transcription error: {0}")]
    TranscribeError(String),

    #[error("Answer error: {0}")]
    AnswerError(String),

    #[error("Speech synthesis error: {0}")]
    SpeechError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Session error: {0}")]
    SessionError(String),
}

impl From<std::io::Error> for NatterError {
    fn from(e: std::io::Error) -> Self {
        NatterError::IOError(e.to_string())
    }
}

impl NatterError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Hardware/device errors may require user intervention
            NatterError::AudioDeviceError(_) => false,
            // Service calls are typically transient failures
            NatterError::StagingError(_) => true,
            NatterError::TranscribeError(_) => true,
            NatterError::AnswerError(_) => true,
            NatterError::SpeechError(_) => true,
            NatterError::AudioProcessingError(_) => true,
            NatterError::IOError(_) => false,
            NatterError::ConfigError(_) => false,
            NatterError::ChannelError(_) => false,
            NatterError::SessionError(_) => true,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            NatterError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            NatterError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            NatterError::StagingError(_) => {
                "Failed to upload audio for transcription. Please try again.".to_string()
            }
            NatterError::TranscribeError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            NatterError::AnswerError(_) => {
                "Answer generation failed. Please try again.".to_string()
            }
            NatterError::SpeechError(_) => {
                "Speech synthesis failed. Response will be shown as text.".to_string()
            }
            NatterError::IOError(_) => {
                "File system error occurred.".to_string()
            }
            NatterError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            NatterError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            NatterError::SessionError(_) => {
                "Session error occurred. Please try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, NatterError>;
