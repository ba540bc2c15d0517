use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::llm::{CompletionGateway, CompletionRequest};
use crate::models::{RequestEnvelope, ResponseEnvelope};
use crate::session::{SessionState, SessionStateError};

mod routes;

use routes::SkillRoute;

pub const LAUNCH_SPEECH: &str = "Alexa gen AI mode activated";
pub const QUERY_REPROMPT: &str = "Any other questions?";
pub const FAREWELL_SPEECH: &str = "Leaving Alexa Gen AI mode";
pub const APOLOGY_SPEECH: &str = "Sorry, I had trouble doing what you asked. Please try again.";

/// Failures that end up in the catch-all handler. Completion failures are
/// not here: they are spoken back as the answer.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("no handler for request type {0}")]
    UnsupportedRequest(String),
    #[error("intent request is missing its intent")]
    MissingIntent,
    #[error("no handler for intent {0}")]
    UnhandledIntent(String),
    #[error("intent is missing required slot {0}")]
    MissingSlot(&'static str),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error("request envelope is invalid: {0}")]
    InvalidEnvelope(String),
}

#[derive(Clone)]
pub struct SkillRouter {
    gateway: Arc<dyn CompletionGateway>,
    system_prompt: Arc<str>,
}

impl SkillRouter {
    pub fn new(gateway: Arc<dyn CompletionGateway>, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            gateway,
            system_prompt: system_prompt.into(),
        }
    }

    /// Always produces a response; handler failures go to [`catch_all`].
    pub async fn dispatch(&self, envelope: &RequestEnvelope) -> ResponseEnvelope {
        match self.route(envelope).await {
            Ok(response) => response,
            Err(err) => catch_all(envelope.session_attributes(), &err),
        }
    }

    async fn route(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, SkillError> {
        let route = SkillRoute::classify(envelope)?;
        debug!(
            request_type = %envelope.request.request_type,
            request_id = envelope.request.request_id.as_deref().unwrap_or("-"),
            route = ?route,
            "dispatching skill request"
        );

        match route {
            SkillRoute::Launch => Ok(handle_launch(envelope.session_attributes())),
            SkillRoute::Query { query } => {
                self.handle_query(envelope.session_attributes(), query).await
            }
            SkillRoute::CancelOrStop => Ok(handle_cancel_or_stop(envelope.session_attributes())),
            SkillRoute::SessionEnded { reason } => Ok(handle_session_ended(reason)),
        }
    }

    async fn handle_query(
        &self,
        mut attributes: Map<String, Value>,
        query: &str,
    ) -> Result<ResponseEnvelope, SkillError> {
        let mut state = SessionState::from_attributes(&attributes)?;

        let request = CompletionRequest::new(&self.system_prompt, &state.chat_history, query);
        let answer = match self.gateway.complete(request).await {
            Ok(answer) => answer,
            Err(err) => err.to_string(),
        };

        state.record_turn(query, answer.as_str());
        state.write_into(&mut attributes);
        info!(history_turns = state.chat_history.len(), "answered skill query");

        Ok(ResponseEnvelope::speak(answer)
            .ask(QUERY_REPROMPT)
            .with_session_attributes(attributes))
    }
}

fn handle_launch(mut attributes: Map<String, Value>) -> ResponseEnvelope {
    SessionState::default().write_into(&mut attributes);

    ResponseEnvelope::speak(LAUNCH_SPEECH)
        .ask(LAUNCH_SPEECH)
        .with_session_attributes(attributes)
}

fn handle_cancel_or_stop(attributes: Map<String, Value>) -> ResponseEnvelope {
    ResponseEnvelope::speak(FAREWELL_SPEECH)
        .end_session()
        .with_session_attributes(attributes)
}

fn handle_session_ended(reason: Option<&str>) -> ResponseEnvelope {
    info!(reason = reason.unwrap_or("unknown"), "skill session ended");
    ResponseEnvelope::empty()
}

/// Logs the failure and apologises, keeping the session open with the
/// caller's attributes untouched.
pub fn catch_all(attributes: Map<String, Value>, err: &SkillError) -> ResponseEnvelope {
    error!(error = %err, "skill request failed");
    ResponseEnvelope::speak(APOLOGY_SPEECH)
        .ask(APOLOGY_SPEECH)
        .with_session_attributes(attributes)
}
