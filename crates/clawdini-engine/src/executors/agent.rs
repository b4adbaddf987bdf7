//! Agent node — one chat turn against a gateway agent

use super::{merged_text, parse_config, role_preset};
use crate::chat_call::{self, ChatCall};
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use clawdini_core::{Node, NodePayload, PayloadMeta, Purpose, Result};
use serde::Deserialize;

fn default_agent_id() -> String {
    "main".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentConfig {
    #[serde(default = "default_agent_id")]
    agent_id: String,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            model_id: None,
            role: None,
        }
    }
}

pub(super) async fn execute(
    ctx: &ExecutorContext,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: AgentConfig = parse_config(node)?;
    let prompt = build_prompt(config.role.as_deref(), &merged_text(inputs));

    let output = chat_call::call(
        ctx,
        &node.id,
        &prompt,
        ChatCall {
            agent_id: config.agent_id.clone(),
            purpose: Purpose::Clawdini,
            model_id: config.model_id.clone(),
            partial_ok: false,
        },
    )
    .await?;

    Ok(ExecOutcome::payload(NodePayload {
        text: output.text,
        json: None,
        meta: PayloadMeta {
            session_key: Some(output.session_key.as_str().to_string()),
            model_id: config.model_id,
            agent_id: Some(config.agent_id),
            latency_ms: Some(output.latency_ms),
            ..Default::default()
        },
    }))
}

fn build_prompt(role: Option<&str>, merged: &str) -> String {
    match role.and_then(role_preset) {
        Some(preset) => format!("{}\n\n--- INPUT ---\n{}", preset, merged),
        None => merged.to_string(),
    }
}
