use crate::models::{
    REQUEST_TYPE_INTENT, REQUEST_TYPE_LAUNCH, REQUEST_TYPE_SESSION_ENDED, RequestEnvelope,
};

use super::SkillError;

pub const QUERY_INTENT: &str = "GptQueryIntent";
pub const QUERY_SLOT: &str = "query";
pub const CANCEL_INTENT: &str = "AMAZON.CancelIntent";
pub const STOP_INTENT: &str = "AMAZON.StopIntent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillRoute<'a> {
    Launch,
    Query { query: &'a str },
    CancelOrStop,
    SessionEnded { reason: Option<&'a str> },
}

impl<'a> SkillRoute<'a> {
    pub fn classify(envelope: &'a RequestEnvelope) -> Result<Self, SkillError> {
        match envelope.request.request_type.as_str() {
            REQUEST_TYPE_LAUNCH => Ok(Self::Launch),
            REQUEST_TYPE_SESSION_ENDED => Ok(Self::SessionEnded {
                reason: envelope.request.reason.as_deref(),
            }),
            REQUEST_TYPE_INTENT => classify_intent(envelope),
            other => Err(SkillError::UnsupportedRequest(other.to_string())),
        }
    }
}

fn classify_intent(envelope: &RequestEnvelope) -> Result<SkillRoute<'_>, SkillError> {
    let intent_name = envelope.intent_name().ok_or(SkillError::MissingIntent)?;

    match intent_name {
        QUERY_INTENT => {
            // Blank means missing; otherwise the spoken text is kept verbatim.
            let query = envelope
                .slot_value(QUERY_SLOT)
                .filter(|query| !query.trim().is_empty())
                .ok_or(SkillError::MissingSlot(QUERY_SLOT))?;
            Ok(SkillRoute::Query { query })
        }
        CANCEL_INTENT | STOP_INTENT => Ok(SkillRoute::CancelOrStop),
        other => Err(SkillError::UnhandledIntent(other.to_string())),
    }
}
