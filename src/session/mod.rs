pub mod config;
pub mod orchestrator;

pub use config::{SessionConfig, TranscribeMode};
pub use orchestrator::{Session, SessionCommand, SessionEvent, SessionHandle};
