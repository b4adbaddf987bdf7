//! Merge node — fan-in by concatenation or model synthesis

use super::parse_config;
use crate::chat_call::{self, ChatCall};
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use clawdini_core::{Node, NodePayload, PayloadMeta, Purpose, Result};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MergeMode {
    #[default]
    Concat,
    Llm,
    Consensus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeConfig {
    #[serde(default)]
    mode: MergeMode,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

const DEFAULT_SYNTHESIS_PROMPT: &str = "Synthesize the following sources into one coherent \
result. Preserve every substantive point, reconcile contradictions explicitly, and do not \
add information that is not present in the sources.\n\n{INPUTS}";

const CONSENSUS_PROMPT: &str = "The following sources are positions from parallel \
contributors. Produce meeting-minutes style output: points of agreement, points of \
disagreement with who holds them, and the consensus position where one exists.\n\n{INPUTS}";

pub(super) async fn execute(
    ctx: &ExecutorContext,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: MergeConfig = parse_config(node)?;

    if config.mode == MergeMode::Concat {
        return Ok(ExecOutcome::payload(NodePayload::from_text(sources_block(
            inputs,
        ))));
    }

    // Model-backed modes: nothing to merge and a single input short-circuit
    match inputs.len() {
        0 => return Ok(ExecOutcome::payload(NodePayload::default())),
        1 => return Ok(ExecOutcome::payload(inputs[0].payload.clone())),
        _ => {}
    }

    let template = match (&config.prompt, config.mode) {
        (Some(prompt), _) => prompt.as_str(),
        (None, MergeMode::Consensus) => CONSENSUS_PROMPT,
        (None, _) => DEFAULT_SYNTHESIS_PROMPT,
    };
    let prompt = substitute_inputs(template, &sources_block(inputs));

    let output = chat_call::call(
        ctx,
        &node.id,
        &prompt,
        ChatCall {
            agent_id: "main".into(),
            purpose: Purpose::Merge,
            model_id: config.model_id.clone(),
            // A timeout with partial output returns the partial text
            partial_ok: true,
        },
    )
    .await?;

    Ok(ExecOutcome::payload(NodePayload {
        text: output.text,
        json: None,
        meta: PayloadMeta {
            session_key: Some(output.session_key.as_str().to_string()),
            model_id: config.model_id,
            latency_ms: Some(output.latency_ms),
            ..Default::default()
        },
    }))
}

/// `=== Source i ===` blocks, one per input, separated by blank lines.
fn sources_block(inputs: &[EdgeInput]) -> String {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| format!("=== Source {} ===\n{}\n", i + 1, input.payload.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `{INPUTS}` case-insensitively; append the block when the user's
/// prompt never references it.
fn substitute_inputs(template: &str, block: &str) -> String {
    static INPUTS_RE: OnceLock<Regex> = OnceLock::new();
    let re = INPUTS_RE.get_or_init(|| Regex::new(r"(?i)\{INPUTS\}").expect("inputs token regex"));
    if re.is_match(template) {
        re.replace_all(template, block).into_owned()
    } else {
        format!("{}\n\n{}", template, block)
    }
}
