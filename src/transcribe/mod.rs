pub mod client;
pub mod poll;
pub mod stream;
pub mod types;

pub use client::{TranscribeClient, TranscribeConfig};
pub use poll::{poll_until_terminal, PollConfig, PollOutcome};
pub use stream::{StreamEvent, StreamingTranscriber};
pub use types::{JobStatus, TranscriptDocument, TranscriptionJob};
