//! Run-scoped event stream — what subscribers observe during execution

use crate::payload::NodePayload;
use serde::{Deserialize, Serialize};

/// One event in a run's stream. Serialized shapes match the wire contract:
/// `{type:"nodeDelta", nodeId, data:{text,meta}}` etc. Delta events carry
/// only the new text suffix, never the cumulative gateway text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RunEvent {
    /// Informational preamble sent to a subscriber when it attaches.
    Connected { run_id: String },
    RunStarted { run_id: String },
    RunCompleted { run_id: String },
    RunError { run_id: String, error: String },
    RunCancelled { run_id: String },
    NodeStarted { node_id: String, data: NodePayload },
    NodeDelta { node_id: String, data: NodePayload },
    NodeFinal { node_id: String, data: NodePayload },
    NodeError { node_id: String, error: String },
    NodeAborted { node_id: String },
    Thinking { node_id: String, content: String },
}

impl RunEvent {
    pub fn node_started(node_id: impl Into<String>) -> Self {
        Self::NodeStarted {
            node_id: node_id.into(),
            data: NodePayload::default(),
        }
    }

    pub fn node_delta(node_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::NodeDelta {
            node_id: node_id.into(),
            data: NodePayload::from_text(text),
        }
    }

    pub fn node_final(node_id: impl Into<String>, data: NodePayload) -> Self {
        Self::NodeFinal {
            node_id: node_id.into(),
            data,
        }
    }

    pub fn node_error(node_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeError {
            node_id: node_id.into(),
            error: error.into(),
        }
    }

    pub fn node_aborted(node_id: impl Into<String>) -> Self {
        Self::NodeAborted {
            node_id: node_id.into(),
        }
    }

    pub fn thinking(node_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Thinking {
            node_id: node_id.into(),
            content: content.into(),
        }
    }

    /// Whether this event terminates its run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunError { .. } | Self::RunCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_wire_shapes() {
        let evt = RunEvent::RunStarted {
            run_id: "run-1".into(),
        };
        assert_eq!(
            serde_json::to_value(&evt).unwrap(),
            json!({ "type": "runStarted", "runId": "run-1" })
        );

        let evt = RunEvent::node_delta("n1", "llo");
        let v = serde_json::to_value(&evt).unwrap();
        assert_eq!(v["type"], "nodeDelta");
        assert_eq!(v["nodeId"], "n1");
        assert_eq!(v["data"]["text"], "llo");
    }

    #[test]
    fn terminal_classification() {
        assert!(RunEvent::RunCompleted { run_id: "r".into() }.is_terminal());
        assert!(RunEvent::RunCancelled { run_id: "r".into() }.is_terminal());
        assert!(!RunEvent::node_aborted("n").is_terminal());
    }
}
