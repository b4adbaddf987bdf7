//! Switch node — routes flow by disabling non-matching out-edges

use super::{merged_text, parse_config};
use crate::context::{EdgeInput, ExecOutcome};
use crate::scope::walk_path;
use clawdini_core::{Graph, Node, NodePayload, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum RuleMode {
    #[default]
    Regex,
    FieldMatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchRule {
    id: String,
    #[serde(default)]
    mode: RuleMode,
    #[serde(default)]
    condition: String,
    #[serde(default)]
    value_match: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SwitchConfig {
    #[serde(default)]
    rules: Vec<SwitchRule>,
}

pub(super) fn execute(graph: &Graph, node: &Node, inputs: &[EdgeInput]) -> Result<ExecOutcome> {
    let config: SwitchConfig = parse_config(node)?;
    let text = merged_text(inputs);

    let mut matched: HashSet<&str> = HashSet::new();
    for rule in &config.rules {
        if rule_matches(rule, &text, inputs) {
            matched.insert(rule.id.as_str());
        }
    }

    let mut disable_edges = Vec::new();
    for edge in graph.out_edges(&node.id) {
        let keep = edge
            .source_handle
            .as_deref()
            .is_some_and(|handle| matched.contains(handle));
        if !keep {
            disable_edges.push(edge.id.clone());
        }
    }

    let payload = if matched.is_empty() {
        NodePayload::from_text("Halted (No conditions matched)")
    } else {
        NodePayload::from_text(format!("Flow routed to {} branches", matched.len()))
    };

    Ok(ExecOutcome {
        payload,
        disable_edges,
    })
}

fn rule_matches(rule: &SwitchRule, text: &str, inputs: &[EdgeInput]) -> bool {
    match rule.mode {
        RuleMode::Regex => match Regex::new(&rule.condition) {
            Ok(re) => re.is_match(text),
            Err(e) => {
                warn!("skipping switch rule {} with invalid regex: {}", rule.id, e);
                false
            }
        },
        RuleMode::FieldMatch => inputs
            .iter()
            .filter_map(|i| i.payload.json.as_ref())
            .any(|json| field_matches(json, &rule.condition, rule.value_match.as_deref())),
    }
}

/// Walk the dotted path; with a `valueMatch` compare textually, without one
/// the field matches when present and neither null nor false.
fn field_matches(json: &Value, path: &str, value_match: Option<&str>) -> bool {
    let Some(target) = walk_path(json, path) else {
        return false;
    };
    match value_match {
        Some(expected) => match target {
            Value::String(s) => s == expected,
            other => other.to_string() == expected,
        },
        None => !matches!(target, Value::Null | Value::Bool(false)),
    }
}
