use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::gateway::{CompletionError, CompletionFuture, CompletionGateway, CompletionRequest};

#[derive(Clone)]
pub struct CompletionClientConfig {
    pub endpoint_url: String,
    pub api_key: String,
    pub api_key_header: String,
    /// `None` keeps the transport's default behaviour.
    pub timeout_ms: Option<u64>,
}

impl std::fmt::Debug for CompletionClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClientConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &"<redacted>")
            .field("api_key_header", &self.api_key_header)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CompletionClientError {
    #[error("invalid api key header: {0}")]
    InvalidHeader(String),
    #[error("failed to build completion http client: {0}")]
    HttpClient(String),
}

#[derive(Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint_url: String,
    api_key_header: HeaderName,
    api_key: HeaderValue,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionClientConfig) -> Result<Self, CompletionClientError> {
        let api_key_header = HeaderName::from_bytes(config.api_key_header.as_bytes())
            .map_err(|err| CompletionClientError::InvalidHeader(err.to_string()))?;
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|err| CompletionClientError::InvalidHeader(err.to_string()))?;
        api_key.set_sensitive(true);

        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|err| CompletionClientError::HttpClient(err.to_string()))?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url,
            api_key_header,
            api_key,
        })
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let started_at = Instant::now();
        let response = self
            .client
            .post(&self.endpoint_url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(self.api_key_header.clone(), self.api_key.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        info!(
            status = status.as_u16(),
            latency_ms = started_at.elapsed().as_millis() as u64,
            message_count = request.messages.len(),
            "completion request finished"
        );

        if !status.is_success() {
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                message: parse_provider_error_message(&body)
                    .unwrap_or_else(|| fallback_status_message(status)),
            });
        }

        let parsed: CompletionSuccessResponse = serde_json::from_str(&body)
            .map_err(|err| CompletionError::InvalidPayload(err.to_string()))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            CompletionError::InvalidPayload("response contained no choices".to_string())
        })?;

        match choice.message.content {
            Some(content) => Ok(content),
            None => Err(CompletionError::InvalidPayload(
                "first choice has no message content".to_string(),
            )),
        }
    }
}

impl CompletionGateway for HttpCompletionClient {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            let result = self.send_once(&request).await;
            if let Err(err) = &result {
                warn!(error = %err, "completion request failed");
            }
            result
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionSuccessResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

fn parse_provider_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        message: Option<Value>,
    }

    let message = serde_json::from_str::<ProviderErrorEnvelope>(body)
        .ok()?
        .error?
        .message?;

    match message {
        Value::String(message) => Some(message),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn fallback_status_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{fallback_status_message, parse_provider_error_message};

    #[test]
    fn provider_error_message_is_read_from_error_envelope() {
        assert_eq!(
            parse_provider_error_message(r#"{"error": {"message": "bad key"}}"#).as_deref(),
            Some("bad key")
        );
    }

    #[test]
    fn provider_error_message_is_absent_for_foreign_bodies() {
        assert_eq!(parse_provider_error_message("<html>gateway</html>"), None);
        assert_eq!(parse_provider_error_message(r#"{"error": {"code": 7}}"#), None);
        assert_eq!(parse_provider_error_message(r#"{"detail": "nope"}"#), None);
    }

    #[test]
    fn fallback_message_uses_canonical_reason() {
        assert_eq!(
            fallback_status_message(StatusCode::TOO_MANY_REQUESTS),
            "Too Many Requests"
        );
    }
}
