//! Turn-level streaming events.
//!
//! `ChatStreamEvent` is the ordered delivery protocol a client reads
//! for one turn: one `status` event naming the tools invoked (empty
//! string if none), then content deltas in concatenation order, then
//! exactly one `done`. A failed turn ends with `error` instead.

use serde::{Deserialize, Serialize};

/// Events emitted while a turn streams its answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// Which tools were invoked this turn, comma-joined; empty if none.
    Status { status: String },

    /// Partial answer text from the LLM.
    Content { content: String },

    /// The turn finished and its messages are committed.
    Done { done: bool },

    /// The turn failed; nothing was committed.
    Error { kind: String, message: String },
}

impl ChatStreamEvent {
    /// Build the status event from the tools invoked this turn.
    pub fn status_for(tools: &[String]) -> Self {
        Self::Status {
            status: tools.join(", "),
        }
    }

    pub fn done() -> Self {
        Self::Done { done: true }
    }

    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Content { .. } => "content",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_content() {
        let event = ChatStreamEvent::Content {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"content""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn status_event_joins_tool_names() {
        let event = ChatStreamEvent::status_for(&[
            "list_compute_instances".to_string(),
            "get_project_info".to_string(),
        ]);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("list_compute_instances, get_project_info"));
    }

    #[test]
    fn status_event_empty_when_no_tools() {
        let event = ChatStreamEvent::status_for(&[]);
        match &event {
            ChatStreamEvent::Status { status } => assert!(status.is_empty()),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn done_event_shape() {
        let json = serde_json::to_string(&ChatStreamEvent::done()).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""done":true"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(ChatStreamEvent::status_for(&[]).event_type(), "status");
        assert_eq!(
            ChatStreamEvent::Content {
                content: "x".into()
            }
            .event_type(),
            "content"
        );
        assert_eq!(ChatStreamEvent::done().event_type(), "done");
        assert_eq!(
            ChatStreamEvent::Error {
                kind: "model_unavailable".into(),
                message: "x".into()
            }
            .event_type(),
            "error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"content","content":"hi"}"#;
        let event: ChatStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            ChatStreamEvent::Content { content } => assert_eq!(content, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
