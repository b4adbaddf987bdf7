//! Node executors — one strategy per node kind
//!
//! Every executor consumes the payloads of its enabled in-edges and hands an
//! [`ExecOutcome`] back to the scheduler. Executors never write the runner's
//! maps; routing decisions travel as edge-disable lists in the outcome.

mod agent;
mod extract;
mod foreach;
mod input;
mod invoke;
mod judge;
mod merge;
mod output;
mod state;
mod switch;
mod template;

use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use clawdini_core::{Error, Graph, Node, NodeKind, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Dispatch a node to its kind's executor.
pub async fn execute(
    ctx: &ExecutorContext,
    graph: &Graph,
    node: &Node,
    inputs: Vec<EdgeInput>,
) -> Result<ExecOutcome> {
    match node.kind {
        NodeKind::Input => input::execute(node),
        NodeKind::Template => template::execute(ctx, node, &inputs),
        NodeKind::Agent => agent::execute(ctx, node, &inputs).await,
        NodeKind::Merge => merge::execute(ctx, node, &inputs).await,
        NodeKind::Judge => judge::execute(ctx, node, &inputs).await,
        NodeKind::Switch => switch::execute(graph, node, &inputs),
        NodeKind::Extract => extract::execute(ctx, node, &inputs).await,
        NodeKind::Invoke => invoke::execute(ctx, node, &inputs).await,
        NodeKind::Foreach => foreach::execute(ctx, graph, node, &inputs).await,
        NodeKind::State => state::execute(ctx, node, &inputs),
        NodeKind::Output => output::execute(&inputs),
    }
}

/// Deserialize a node's typed config; a missing record means all defaults.
pub(crate) fn parse_config<T: DeserializeOwned + Default>(node: &Node) -> Result<T> {
    if node.config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(node.config.clone())
        .map_err(|e| Error::node(&node.id, format!("invalid config: {}", e)))
}

/// Upstream texts joined with blank lines — the default input aggregation.
pub(crate) fn merged_text(inputs: &[EdgeInput]) -> String {
    inputs
        .iter()
        .map(|i| i.payload.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First structured upstream value, if any producer parsed one.
pub(crate) fn first_json(inputs: &[EdgeInput]) -> Option<&Value> {
    inputs.iter().find_map(|i| i.payload.json.as_ref())
}

/// Strip an accidental markdown fence around model-emitted JSON.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return trimmed,
    };
    body.trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Canonical system prompts for the agent role presets. `custom` is a no-op.
pub(crate) fn role_preset(role: &str) -> Option<&'static str> {
    match role {
        "planner" => Some(
            "You are a planning specialist. Break the task into a concrete, \
             ordered plan with clear steps, owners, and success criteria. \
             Flag risks and unknowns explicitly.",
        ),
        "critic" => Some(
            "You are a critical reviewer. Examine the input for errors, gaps, \
             unstated assumptions, and weak reasoning. Be specific and \
             constructive; rank issues by severity.",
        ),
        "researcher" => Some(
            "You are a research specialist. Gather the relevant facts, cite \
             where each claim comes from, and separate what is known from \
             what is uncertain.",
        ),
        "operator" => Some(
            "You are an execution operator. Carry out the requested work \
             directly and report exactly what was done, including any \
             commands, artifacts, or follow-ups.",
        ),
        _ => None,
    }
}
