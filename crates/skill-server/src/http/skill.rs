use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Map, Value};
use shared::models::RequestEnvelope;
use shared::skill::{SkillError, catch_all};
use tracing::warn;

use super::AppState;
use super::errors::{bad_request_response, forbidden_response};
use super::observability::{RequestContext, SkillRequestTag};
use super::verification::VerificationFailure;

pub(super) async fn handle_skill_request(
    State(state): State<AppState>,
    Extension(request_context): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    // Every body, JSON or not, ends in a spoken response.
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(err) => return invalid_envelope_response(Map::new(), err),
    };
    let envelope = match serde_json::from_value::<RequestEnvelope>(payload.clone()) {
        Ok(envelope) => envelope,
        Err(err) => return invalid_envelope_response(raw_session_attributes(&payload), err),
    };
    let tag = SkillRequestTag::from_envelope(&envelope);

    let mut response = match state.verification.verify(&envelope, Utc::now()) {
        Ok(()) => Json(state.skill_router.dispatch(&envelope).await).into_response(),
        Err(failure) => {
            warn!(
                request_id = %request_context.request_id,
                skill_request_id = tag.skill_request_id.as_deref().unwrap_or("-"),
                failure = ?failure,
                "rejected skill request"
            );
            verification_failure_response(failure)
        }
    };
    response.extensions_mut().insert(tag);
    response
}

fn invalid_envelope_response(attributes: Map<String, Value>, err: serde_json::Error) -> Response {
    Json(catch_all(attributes, &SkillError::InvalidEnvelope(err.to_string()))).into_response()
}

/// Best-effort read of the attribute bag from a payload that failed to decode,
/// so the apology does not wipe the conversation.
fn raw_session_attributes(payload: &Value) -> Map<String, Value> {
    payload
        .get("session")
        .and_then(|session| session.get("attributes"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn verification_failure_response(failure: VerificationFailure) -> Response {
    match failure {
        VerificationFailure::SkillIdMismatch => forbidden_response(
            "skill_id_mismatch",
            "Request is addressed to a different skill",
        ),
        VerificationFailure::MissingTimestamp => bad_request_response(
            "invalid_request_timestamp",
            "Request timestamp is missing",
        ),
        VerificationFailure::StaleTimestamp { .. } => bad_request_response(
            "invalid_request_timestamp",
            "Request timestamp is outside the allowed tolerance",
        ),
    }
}
