use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RESPONSE_ENVELOPE_VERSION: &str = "1.0";

pub const REQUEST_TYPE_LAUNCH: &str = "LaunchRequest";
pub const REQUEST_TYPE_INTENT: &str = "IntentRequest";
pub const REQUEST_TYPE_SESSION_ENDED: &str = "SessionEndedRequest";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub session: Option<SkillSession>,
    #[serde(default)]
    pub context: Option<SkillContext>,
    pub request: SkillRequest,
}

impl RequestEnvelope {
    /// Application id from the session, falling back to the device context.
    pub fn application_id(&self) -> Option<&str> {
        let from_session = self
            .session
            .as_ref()
            .and_then(|session| session.application.as_ref());
        let from_context = self
            .context
            .as_ref()
            .and_then(|context| context.system.as_ref())
            .and_then(|system| system.application.as_ref());

        from_session
            .or(from_context)
            .map(|application| application.application_id.as_str())
    }

    pub fn session_attributes(&self) -> Map<String, Value> {
        self.session
            .as_ref()
            .and_then(|session| session.attributes.clone())
            .unwrap_or_default()
    }

    pub fn intent_name(&self) -> Option<&str> {
        self.request.intent.as_ref().map(|intent| intent.name.as_str())
    }

    pub fn slot_value(&self, slot: &str) -> Option<&str> {
        self.request
            .intent
            .as_ref()
            .and_then(|intent| intent.slots.get(slot))
            .and_then(|slot| slot.value.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSession {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub application: Option<SkillApplication>,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillApplication {
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillContext {
    #[serde(rename = "System", default)]
    pub system: Option<SkillSystemContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSystemContext {
    #[serde(default)]
    pub application: Option<SkillApplication>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub intent: Option<SkillIntent>,
    /// Present on session-ended requests.
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillIntent {
    pub name: String,
    #[serde(default)]
    pub slots: HashMap<String, SkillSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSlot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub version: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub session_attributes: Map<String, Value>,
    pub response: ResponseBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_end_session: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputSpeech {
    PlainText { text: String },
}

impl OutputSpeech {
    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    pub output_speech: OutputSpeech,
}

impl ResponseEnvelope {
    /// A response with no speech, used where the platform forbids it.
    pub fn empty() -> Self {
        Self {
            version: RESPONSE_ENVELOPE_VERSION.to_string(),
            session_attributes: Map::new(),
            response: ResponseBody::default(),
        }
    }

    pub fn speak(text: impl Into<String>) -> Self {
        let mut envelope = Self::empty();
        envelope.response.output_speech = Some(OutputSpeech::PlainText { text: text.into() });
        envelope
    }

    /// Adds a reprompt, which keeps the session open for another utterance.
    pub fn ask(mut self, text: impl Into<String>) -> Self {
        self.response.reprompt = Some(Reprompt {
            output_speech: OutputSpeech::PlainText { text: text.into() },
        });
        self.response.should_end_session = Some(false);
        self
    }

    pub fn end_session(mut self) -> Self {
        self.response.reprompt = None;
        self.response.should_end_session = Some(true);
        self
    }

    pub fn with_session_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.session_attributes = attributes;
        self
    }

    pub fn spoken_text(&self) -> Option<&str> {
        self.response.output_speech.as_ref().map(OutputSpeech::text)
    }

    pub fn reprompt_text(&self) -> Option<&str> {
        self.response
            .reprompt
            .as_ref()
            .map(|reprompt| reprompt.output_speech.text())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RequestEnvelope, ResponseEnvelope};

    #[test]
    fn request_envelope_reads_platform_payload() {
        let envelope: RequestEnvelope = serde_json::from_value(json!({
            "version": "1.0",
            "session": {
                "new": false,
                "sessionId": "amzn1.echo-api.session.1",
                "application": { "applicationId": "amzn1.ask.skill.abc" },
                "attributes": { "chat_history": [] }
            },
            "context": {
                "System": { "application": { "applicationId": "amzn1.ask.skill.abc" } }
            },
            "request": {
                "type": "IntentRequest",
                "requestId": "amzn1.echo-api.request.1",
                "timestamp": "2026-10-17T09:30:00Z",
                "locale": "en-US",
                "intent": {
                    "name": "GptQueryIntent",
                    "confirmationStatus": "NONE",
                    "slots": { "query": { "name": "query", "value": "what is rust" } }
                }
            }
        }))
        .expect("envelope should decode");

        assert_eq!(envelope.application_id(), Some("amzn1.ask.skill.abc"));
        assert_eq!(envelope.intent_name(), Some("GptQueryIntent"));
        assert_eq!(envelope.slot_value("query"), Some("what is rust"));
        assert!(envelope.session_attributes().contains_key("chat_history"));
        assert!(envelope.request.timestamp.is_some());
    }

    #[test]
    fn application_id_falls_back_to_context() {
        let envelope: RequestEnvelope = serde_json::from_value(json!({
            "context": { "System": { "application": { "applicationId": "ctx-app" } } },
            "request": { "type": "LaunchRequest" }
        }))
        .expect("envelope should decode");

        assert_eq!(envelope.application_id(), Some("ctx-app"));
        assert!(envelope.session_attributes().is_empty());
    }

    #[test]
    fn response_envelope_serializes_speech_reprompt_and_session_flag() {
        let response = ResponseEnvelope::speak("Paris").ask("Any other questions?");
        let encoded = serde_json::to_value(&response).expect("response should encode");

        assert_eq!(
            encoded,
            json!({
                "version": "1.0",
                "response": {
                    "outputSpeech": { "type": "PlainText", "text": "Paris" },
                    "reprompt": {
                        "outputSpeech": { "type": "PlainText", "text": "Any other questions?" }
                    },
                    "shouldEndSession": false
                }
            })
        );
    }

    #[test]
    fn end_session_drops_reprompt() {
        let response = ResponseEnvelope::speak("bye").ask("still there?").end_session();
        assert_eq!(response.reprompt_text(), None);
        assert_eq!(response.response.should_end_session, Some(true));
    }
}
