use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// Most conversation turns carried into one completion request
pub const MAX_CONTEXT_TURNS: usize = 20;

/// Character budget across carried turns, oldest dropped first
pub const MAX_CONTEXT_CHARS: usize = 12000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One message in the completion request body
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// Rolling conversation window sent with every completion request.
///
/// The system prompt is pinned; user and assistant turns age out oldest
/// first once the turn or character budget is exceeded.
#[derive(Debug, Clone)]
pub struct ChatContext {
    system_prompt: String,
    turns: VecDeque<PromptMessage>,
    max_turns: usize,
    max_chars: usize,
}

impl ChatContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self::with_limits(system_prompt, MAX_CONTEXT_TURNS, MAX_CONTEXT_CHARS)
    }

    pub fn with_limits(system_prompt: impl Into<String>, max_turns: usize, max_chars: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            turns: VecDeque::new(),
            max_turns,
            max_chars,
        }
    }

    pub fn push_user(&mut self, text: &str) {
        self.turns.push_back(PromptMessage::user(text));
        self.trim_to_fit();
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.turns.push_back(PromptMessage::assistant(text));
        self.trim_to_fit();
    }

    /// Messages for the next request: system prompt first, then the window
    pub fn messages(&self) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(PromptMessage::system(self.system_prompt.clone()));
        messages.extend(self.turns.iter().cloned());
        messages
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    fn total_chars(&self) -> usize {
        self.turns.iter().map(|m| m.content.len()).sum()
    }

    fn trim_to_fit(&mut self) {
        let mut dropped = 0;
        while self.turns.len() > 1
            && (self.turns.len() > self.max_turns || self.total_chars() > self.max_chars)
        {
            self.turns.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} oldest turns to fit the context window", dropped);
        }
    }
}
