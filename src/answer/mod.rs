pub mod client;
pub mod context;
pub mod prompts;

pub use client::{AnswerClient, AnswerConfig};
pub use context::{ChatContext, PromptMessage, PromptRole};
pub use prompts::SYSTEM_PROMPT;
