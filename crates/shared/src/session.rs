use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Number of prior turns replayed to the model on every query.
pub const HISTORY_WINDOW_TURNS: usize = 10;

pub const CHAT_HISTORY_ATTRIBUTE: &str = "chat_history";

/// One answered question. Encoded as a `[query, answer]` pair so existing
/// session attributes stay readable across deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct ChatTurn {
    pub query: String,
    pub answer: String,
}

impl ChatTurn {
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
        }
    }
}

impl From<(String, String)> for ChatTurn {
    fn from((query, answer): (String, String)) -> Self {
        Self { query, answer }
    }
}

impl From<ChatTurn> for (String, String) {
    fn from(turn: ChatTurn) -> Self {
        (turn.query, turn.answer)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug, Error)]
#[error("session attribute {key} is malformed: {source}")]
pub struct SessionStateError {
    key: &'static str,
    #[source]
    source: serde_json::Error,
}

impl SessionState {
    /// Reads the typed state out of a session attribute bag. A missing
    /// history starts empty; a present but malformed one is an error.
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Self, SessionStateError> {
        let Some(raw_history) = attributes.get(CHAT_HISTORY_ATTRIBUTE) else {
            return Ok(Self::default());
        };

        let chat_history = serde_json::from_value::<Vec<ChatTurn>>(raw_history.clone())
            .map_err(|source| SessionStateError {
                key: CHAT_HISTORY_ATTRIBUTE,
                source,
            })?;

        Ok(Self { chat_history })
    }

    /// Writes the state back over `attributes`, preserving unrelated keys.
    pub fn write_into(&self, attributes: &mut Map<String, Value>) {
        let history = self
            .chat_history
            .iter()
            .map(|turn| {
                Value::Array(vec![
                    Value::String(turn.query.clone()),
                    Value::String(turn.answer.clone()),
                ])
            })
            .collect();
        attributes.insert(CHAT_HISTORY_ATTRIBUTE.to_string(), Value::Array(history));
    }

    pub fn record_turn(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.chat_history.push(ChatTurn::new(query, answer));
    }
}

/// The most recent turns, oldest first, capped at [`HISTORY_WINDOW_TURNS`].
pub fn recent_window(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW_TURNS);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::{
        CHAT_HISTORY_ATTRIBUTE, ChatTurn, HISTORY_WINDOW_TURNS, SessionState, recent_window,
    };

    fn attributes(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("attributes fixture must be an object"),
        }
    }

    #[test]
    fn missing_history_starts_empty() {
        let state = SessionState::from_attributes(&Map::new()).expect("empty bag is valid");
        assert!(state.chat_history.is_empty());
    }

    #[test]
    fn history_reads_pair_encoding_in_order() {
        let bag = attributes(json!({
            "chat_history": [["capital of France?", "Paris"], ["and Italy?", "Rome"]]
        }));

        let state = SessionState::from_attributes(&bag).expect("pairs should decode");
        assert_eq!(
            state.chat_history,
            vec![
                ChatTurn::new("capital of France?", "Paris"),
                ChatTurn::new("and Italy?", "Rome"),
            ]
        );
    }

    #[test]
    fn malformed_history_is_rejected() {
        let bag = attributes(json!({ "chat_history": "not-a-list" }));
        let err = SessionState::from_attributes(&bag).expect_err("string history is malformed");
        assert!(err.to_string().contains(CHAT_HISTORY_ATTRIBUTE));
    }

    #[test]
    fn write_into_keeps_unrelated_attributes() {
        let mut bag = attributes(json!({ "locale_hint": "en-US" }));
        let mut state = SessionState::default();
        state.record_turn("hello", "hi there");
        state.write_into(&mut bag);

        assert_eq!(bag["locale_hint"], "en-US");
        assert_eq!(bag["chat_history"], json!([["hello", "hi there"]]));
    }

    #[test]
    fn recent_window_keeps_last_ten_in_chronological_order() {
        let mut state = SessionState::default();
        for index in 0..15 {
            state.record_turn(format!("q{index}"), format!("a{index}"));
        }

        let window = recent_window(&state.chat_history);
        assert_eq!(window.len(), HISTORY_WINDOW_TURNS);
        assert_eq!(window.first().map(|turn| turn.query.as_str()), Some("q5"));
        assert_eq!(window.last().map(|turn| turn.query.as_str()), Some("q14"));
        // storage itself is never truncated
        assert_eq!(state.chat_history.len(), 15);
    }
}
