//! ForEach node — fans an array out over child sub-graph runs

use super::{first_json, merged_text, parse_config};
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use crate::runner;
use crate::scope::walk_path;
use crate::subgraph::successors_subgraph;
use clawdini_core::{Graph, Node, NodePayload, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForeachConfig {
    #[serde(default)]
    array_path: Option<String>,
}

pub(super) async fn execute(
    ctx: &ExecutorContext,
    graph: &Graph,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: ForeachConfig = parse_config(node)?;

    // The parent never executes this node's successors itself — they belong
    // to the children — so its out-edges are disabled either way.
    let out_edges: Vec<String> = graph.out_edges(&node.id).map(|e| e.id.clone()).collect();

    let Some(items) = resolve_array(config.array_path.as_deref(), inputs) else {
        return Ok(ExecOutcome {
            payload: NodePayload::from_text("Halted (No Array Found)"),
            disable_edges: out_edges,
        });
    };

    let sub = Arc::new(successors_subgraph(graph, &node.id));
    info!(
        "foreach {} fanning {} elements over {} sub-graph nodes",
        node.id,
        items.len(),
        sub.nodes.len()
    );

    let children = items.iter().map(|element| {
        let input = match element {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        runner::run_child(Arc::clone(&sub), ctx, input)
    });
    futures::future::join_all(children).await;

    Ok(ExecOutcome {
        payload: NodePayload::from_text(format!(
            "Completed {} parallel sub-executions.",
            items.len()
        )),
        disable_edges: out_edges,
    })
}

/// Locate the fan-out array: the upstream's parsed JSON (walking
/// `arrayPath` when set), falling back to parsing the merged text. Anything
/// but a non-empty array halts the fan-out.
fn resolve_array(array_path: Option<&str>, inputs: &[EdgeInput]) -> Option<Vec<Value>> {
    let base: Value = match first_json(inputs) {
        Some(json) => json.clone(),
        None => serde_json::from_str(&merged_text(inputs)).ok()?,
    };
    let target = match array_path {
        Some(path) if !path.is_empty() => walk_path(&base, path)?.clone(),
        _ => base,
    };
    match target {
        Value::Array(items) if !items.is_empty() => Some(items),
        _ => None,
    }
}
