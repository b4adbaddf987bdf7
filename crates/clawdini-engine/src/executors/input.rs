//! Input node — a literal prompt with no gateway interaction

use super::parse_config;
use crate::context::ExecOutcome;
use clawdini_core::{Node, NodePayload, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct InputConfig {
    #[serde(default)]
    prompt: String,
}

pub(super) fn execute(node: &Node) -> Result<ExecOutcome> {
    let config: InputConfig = parse_config(node)?;
    Ok(ExecOutcome::payload(NodePayload::from_text(config.prompt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(config: serde_json::Value) -> Node {
        serde_json::from_value(json!({ "id": "n", "kind": "input", "config": config })).unwrap()
    }

    #[test]
    fn emits_configured_prompt() {
        let outcome = execute(&node(json!({ "prompt": "hello" }))).unwrap();
        assert_eq!(outcome.payload.text, "hello");
        assert!(outcome.disable_edges.is_empty());
    }

    #[test]
    fn missing_prompt_is_empty_text() {
        let outcome = execute(&node(serde_json::Value::Null)).unwrap();
        assert_eq!(outcome.payload.text, "");
    }
}
