use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Per-turn bookkeeping: where the text came from and how long each
/// pipeline stage took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMeta {
    /// Whether the text originated from captured speech
    pub from_speech: bool,

    /// Transcription latency in milliseconds
    pub transcribe_ms: Option<u64>,

    /// Answer generation latency in milliseconds
    pub answer_ms: Option<u64>,

    /// Speech synthesis latency in milliseconds
    pub synthesis_ms: Option<u64>,
}

impl Default for TurnMeta {
    fn default() -> Self {
        Self {
            from_speech: false,
            transcribe_ms: None,
            answer_ms: None,
            synthesis_ms: None,
        }
    }
}

/// One entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub meta: TurnMeta,
}

impl ChatTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            meta: TurnMeta::default(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn with_meta(mut self, meta: TurnMeta) -> Self {
        self.meta = meta;
        self
    }
}
