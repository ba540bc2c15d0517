use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{ChatTurn, recent_window};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_MAX_TOKENS: u32 = 300;

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParameters {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Body of one chat-completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub sampling: SamplingParameters,
}

impl CompletionRequest {
    /// System prompt first, then the recent history window expanded into
    /// alternating user/assistant messages, then the new question.
    pub fn new(system_prompt: &str, history: &[ChatTurn], query: &str) -> Self {
        let window = recent_window(history);
        let mut messages = Vec::with_capacity(window.len() * 2 + 2);
        messages.push(ChatMessage::new(ChatRole::System, system_prompt));
        for turn in window {
            messages.push(ChatMessage::new(ChatRole::User, turn.query.as_str()));
            messages.push(ChatMessage::new(ChatRole::Assistant, turn.answer.as_str()));
        }
        messages.push(ChatMessage::new(ChatRole::User, query));

        Self {
            messages,
            sampling: SamplingParameters::default(),
        }
    }
}

/// Failures of the completion call. The display text is what the user hears.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("Error {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("Error generating response: {0}")]
    Transport(String),
    #[error("Error generating response: {0}")]
    InvalidPayload(String),
}

pub trait CompletionGateway: Send + Sync {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChatRole, CompletionError, CompletionRequest};
    use crate::session::ChatTurn;

    #[test]
    fn request_windows_history_after_system_message() {
        let history = (0..15)
            .map(|index| ChatTurn::new(format!("q{index}"), format!("a{index}")))
            .collect::<Vec<_>>();

        let request = CompletionRequest::new("be brief", &history, "newest");

        assert_eq!(request.messages.len(), 1 + 10 * 2 + 1);
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[0].content, "be brief");
        assert_eq!(request.messages[1].content, "q5");
        assert_eq!(request.messages[2].role, ChatRole::Assistant);
        assert_eq!(request.messages[2].content, "a5");
        assert_eq!(request.messages[19].content, "q14");
        assert_eq!(request.messages[20].content, "a14");

        let last = request.messages.last().expect("query message");
        assert_eq!(last.role, ChatRole::User);
        assert_eq!(last.content, "newest");
    }

    #[test]
    fn request_serializes_flat_sampling_parameters() {
        let request = CompletionRequest::new("sys", &[ChatTurn::new("hi", "hello")], "again");
        let body = serde_json::to_value(&request).expect("request should serialize");

        assert_eq!(
            body["messages"],
            json!([
                { "role": "system", "content": "sys" },
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" },
                { "role": "user", "content": "again" }
            ])
        );
        assert_eq!(body["max_tokens"], 300);
        assert!((body["temperature"].as_f64().unwrap_or_default() - 0.7).abs() < 1e-6);
        assert!((body["top_p"].as_f64().unwrap_or_default() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn errors_render_as_spoken_text() {
        let provider = CompletionError::Provider {
            status: 401,
            message: "bad key".to_string(),
        };
        assert_eq!(provider.to_string(), "Error 401: bad key");

        let transport = CompletionError::Transport("connection refused".to_string());
        assert_eq!(
            transport.to_string(),
            "Error generating response: connection refused"
        );
    }
}
