use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use shared::models::RequestEnvelope;
use tracing::{info, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone, Debug)]
pub(super) struct RequestContext {
    pub(super) request_id: String,
}

/// Platform identity of a decoded skill request. The skill handler attaches it
/// to the response so the access line can be joined with platform logs.
#[derive(Clone, Debug)]
pub(super) struct SkillRequestTag {
    pub(super) request_type: String,
    pub(super) skill_request_id: Option<String>,
}

impl SkillRequestTag {
    pub(super) fn from_envelope(envelope: &RequestEnvelope) -> Self {
        Self {
            request_type: envelope.request.request_type.clone(),
            skill_request_id: envelope.request.request_id.clone(),
        }
    }
}

pub(super) async fn request_observability_middleware(mut req: Request, next: Next) -> Response {
    let request_id = resolve_request_id(&req);
    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });
    let path = req.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let status = response.status();
    let latency_ms = started_at.elapsed().as_millis() as u64;
    let tag = response.extensions().get::<SkillRequestTag>();
    let request_type = tag.map_or("-", |tag| tag.request_type.as_str());
    let skill_request_id = tag
        .and_then(|tag| tag.skill_request_id.as_deref())
        .unwrap_or("-");

    if status.is_server_error() {
        warn!(
            request_id = %request_id,
            %path,
            status = status.as_u16(),
            latency_ms,
            request_type,
            skill_request_id,
            "skill request failed with server error"
        );
    } else {
        info!(
            request_id = %request_id,
            %path,
            status = status.as_u16(),
            latency_ms,
            request_type,
            skill_request_id,
            "skill request completed"
        );
    }

    response
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| is_valid_request_id(value))
        .map(ToString::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn is_valid_request_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}
