//! Judge node — asks the model for a structured verdict

use super::{merged_text, parse_config, strip_code_fences};
use crate::chat_call::{self, ChatCall};
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use clawdini_core::{Decision, Node, NodePayload, PayloadMeta, Purpose, Result};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JudgeConfig {
    #[serde(default)]
    criteria: String,
    #[serde(default)]
    model_id: Option<String>,
    /// Informational threshold surfaced to routing rules; the judge itself
    /// does not gate on it.
    #[serde(default)]
    pass_score: Option<u8>,
}

pub(super) async fn execute(
    ctx: &ExecutorContext,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: JudgeConfig = parse_config(node)?;
    if let Some(pass_score) = config.pass_score {
        debug!("judge {} pass score hint: {}", node.id, pass_score);
    }

    let prompt = build_prompt(&config.criteria, &merged_text(inputs));
    let output = chat_call::call(
        ctx,
        &node.id,
        &prompt,
        ChatCall {
            agent_id: "main".into(),
            purpose: Purpose::Judge,
            model_id: config.model_id.clone(),
            partial_ok: false,
        },
    )
    .await?;

    let meta = PayloadMeta {
        session_key: Some(output.session_key.as_str().to_string()),
        model_id: config.model_id,
        latency_ms: Some(output.latency_ms),
        ..Default::default()
    };

    let stripped = strip_code_fences(&output.text);
    let payload = match serde_json::from_str::<Decision>(stripped) {
        Ok(decision) => NodePayload {
            text: stripped.to_string(),
            json: Some(serde_json::to_value(&decision)?),
            meta,
        },
        // An unparseable verdict is not fatal; downstream rules see raw text
        Err(e) => {
            debug!("judge {} emitted non-JSON verdict: {}", node.id, e);
            NodePayload {
                text: output.text,
                json: None,
                meta,
            }
        }
    };
    Ok(ExecOutcome::payload(payload))
}

fn build_prompt(criteria: &str, merged: &str) -> String {
    format!(
        "You are a strict evaluator. Judge the INPUT against the CRITERIA.\n\
         Respond with raw JSON only — no prose, no markdown fences — matching exactly:\n\
         {{\"status\": \"done\" | \"continue\" | \"needs_info\" | \"failed\" | \"human_review\",\n\
         \"score\": <integer 0-100>,\n\
         \"reasons\": [<strings>],\n\
         \"missing\": [<strings>],\n\
         \"nextActionHint\": <string>,\n\
         \"recommendedBranch\": <string>}}\n\n\
         CRITERIA:\n{}\n\nINPUT:\n{}",
        criteria, merged
    )
}
