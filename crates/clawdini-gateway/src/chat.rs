//! Chat event parsing and cumulative-delta tracking
//!
//! The gateway streams `chat` events whose text is cumulative: each `delta`
//! (and the `final`) carries the full message so far, not an increment.
//! [`DeltaTracker`] turns that into the incremental suffixes the run event
//! stream forwards to subscribers.

use clawdini_core::SessionKey;
use serde::Deserialize;
use serde_json::Value;

/// Lifecycle of one streamed chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    Delta,
    Final,
    Error,
    Aborted,
}

/// A `chat` event as delivered on the event bus.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub session_key: String,
    pub state: ChatState,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ChatEvent {
    /// Parse the payload of a `chat` event frame. Events without a
    /// recognizable state are dropped by the caller.
    pub fn parse(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }

    pub fn matches_session(&self, key: &SessionKey) -> bool {
        self.session_key == key.as_str()
    }

    /// Extract the cumulative text carried by this event. `message.content`
    /// may be a plain string or a list of content blocks; non-text blocks
    /// are ignored. Falls back to `message.text`.
    pub fn text(&self) -> Option<String> {
        let message = self.message.as_ref()?;
        match message.get("content") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(blocks)) => {
                let mut out = String::new();
                for block in blocks {
                    if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                        if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                            out.push_str(text);
                        }
                    }
                }
                Some(out)
            }
            _ => message
                .get("text")
                .and_then(|t| t.as_str())
                .map(String::from),
        }
    }
}

/// Tracks cumulative text across a chat turn and yields the newly appended
/// suffix per event. When a producer re-issues non-prefix text (rare), the
/// tracker replaces its view and emits only the portion beyond the length
/// already seen.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    seen: String,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the cumulative text of one event; returns the suffix to emit.
    pub fn advance(&mut self, new_text: &str) -> String {
        let suffix = if let Some(rest) = new_text.strip_prefix(self.seen.as_str()) {
            rest.to_string()
        } else {
            let mut cut = self.seen.len().min(new_text.len());
            while cut > 0 && !new_text.is_char_boundary(cut) {
                cut -= 1;
            }
            new_text[cut..].to_string()
        };
        self.seen.clear();
        self.seen.push_str(new_text);
        suffix
    }

    /// The full text observed so far.
    pub fn full(&self) -> &str {
        &self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cumulative_prefixes_yield_suffixes() {
        let mut tracker = DeltaTracker::new();
        assert_eq!(tracker.advance("He"), "He");
        assert_eq!(tracker.advance("Hello"), "llo");
        assert_eq!(tracker.advance("Hello world"), " world");
        assert_eq!(tracker.full(), "Hello world");
    }

    #[test]
    fn repeated_text_yields_nothing() {
        let mut tracker = DeltaTracker::new();
        assert_eq!(tracker.advance("Hello"), "Hello");
        assert_eq!(tracker.advance("Hello"), "");
    }

    #[test]
    fn reissued_text_replaces_and_emits_tail() {
        let mut tracker = DeltaTracker::new();
        tracker.advance("Hello wrld");
        // Producer re-issued corrected text; emit only the tail past what we saw
        assert_eq!(tracker.advance("Hello world!"), "d!");
        assert_eq!(tracker.full(), "Hello world!");
    }

    #[test]
    fn reissued_shorter_text_emits_nothing() {
        let mut tracker = DeltaTracker::new();
        tracker.advance("Hello world");
        assert_eq!(tracker.advance("Hi"), "");
        assert_eq!(tracker.full(), "Hi");
    }

    #[test]
    fn reissue_cut_respects_char_boundaries() {
        let mut tracker = DeltaTracker::new();
        tracker.advance("aaaa");
        // 4-byte cut lands mid-codepoint; tracker backs off to a boundary
        assert_eq!(tracker.advance("héé"), "é");
        assert_eq!(tracker.full(), "héé");
    }

    #[test]
    fn parses_string_content() {
        let event = ChatEvent::parse(&json!({
            "runId": "c1",
            "sessionKey": "agent:main:clawdini:r1:n1",
            "state": "delta",
            "message": { "content": "Hello" },
        }))
        .unwrap();
        assert_eq!(event.state, ChatState::Delta);
        assert_eq!(event.text().as_deref(), Some("Hello"));
    }

    #[test]
    fn parses_block_content_ignoring_non_text() {
        let event = ChatEvent::parse(&json!({
            "runId": "c1",
            "sessionKey": "k",
            "state": "final",
            "message": { "content": [
                { "type": "text", "text": "Hello " },
                { "type": "image", "source": "…" },
                { "type": "text", "text": "world" },
            ] },
        }))
        .unwrap();
        assert_eq!(event.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn falls_back_to_message_text() {
        let event = ChatEvent::parse(&json!({
            "runId": "c1",
            "sessionKey": "k",
            "state": "final",
            "message": { "text": "plain" },
        }))
        .unwrap();
        assert_eq!(event.text().as_deref(), Some("plain"));
    }

    #[test]
    fn error_event_carries_message() {
        let event = ChatEvent::parse(&json!({
            "runId": "c1",
            "sessionKey": "k",
            "state": "error",
            "errorMessage": "model unavailable",
        }))
        .unwrap();
        assert_eq!(event.state, ChatState::Error);
        assert_eq!(event.error_message.as_deref(), Some("model unavailable"));
        assert!(event.text().is_none());
    }
}
