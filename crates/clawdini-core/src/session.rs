//! Session keys — structured names for gateway chat contexts
//!
//! Form: `agent:<agentId>:<purpose>:<runId>:<nodeId>`. Concurrent nodes in
//! the same run never share a session, so resetting one node's context
//! cannot disturb another.

use std::sync::Arc;

/// Why a node opened a chat session. Part of the session key, so the same
/// node can hold e.g. a judge context and a merge context without collision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Purpose {
    Clawdini,
    Merge,
    Judge,
    Extract,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Clawdini => "clawdini",
            Purpose::Merge => "merge",
            Purpose::Judge => "judge",
            Purpose::Extract => "extract",
        }
    }
}

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    /// Build the per-node key.
    pub fn for_node(agent_id: &str, purpose: Purpose, run_id: &str, node_id: &str) -> Self {
        Self::new(format!(
            "agent:{}:{}:{}:{}",
            agent_id,
            purpose.as_str(),
            run_id,
            node_id
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
