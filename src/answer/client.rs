use crate::answer::context::PromptMessage;
use crate::{NatterError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_ANSWER_URL: &str = "http://localhost:9300";

/// Configuration for the answer (chat completion) service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ANSWER_URL.to_string(),
            auth_token: None,
            model: "converse-lite".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for AnswerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// HTTP client for the chat completion API
pub struct AnswerClient {
    client: reqwest::Client,
    config: AnswerConfig,
}

impl AnswerClient {
    pub fn new(config: AnswerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NatterError::AnswerError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Request a completion for the given messages, returning the answer text
    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("Requesting completion with {} messages", messages.len());

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NatterError::AnswerError(format!("Completion request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NatterError::AnswerError(format!(
                "Completion failed with status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| NatterError::AnswerError(format!("Invalid completion response: {}", e)))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| NatterError::AnswerError("Completion returned no choices".into()))?;

        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(NatterError::AnswerError("Completion returned an empty answer".into()));
        }

        info!("Received answer ({} chars)", answer.len());
        Ok(answer)
    }
}
