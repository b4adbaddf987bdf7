//! Extract node — schema-guided JSON extraction

use super::{merged_text, parse_config, strip_code_fences};
use crate::chat_call::{self, ChatCall};
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use clawdini_core::{Node, NodePayload, PayloadMeta, Purpose, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractConfig {
    #[serde(default)]
    schema: String,
    #[serde(default)]
    model_id: Option<String>,
}

pub(super) async fn execute(
    ctx: &ExecutorContext,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: ExtractConfig = parse_config(node)?;

    let prompt = build_prompt(&config.schema, &merged_text(inputs));
    let output = chat_call::call(
        ctx,
        &node.id,
        &prompt,
        ChatCall {
            agent_id: "main".into(),
            purpose: Purpose::Extract,
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
    let payload = match serde_json::from_str::<Value>(stripped) {
        Ok(parsed) => NodePayload {
            text: "Successfully extracted JSON data.".into(),
            json: Some(parsed),
            meta,
        },
        Err(e) => {
            debug!("extract {} produced non-JSON output: {}", node.id, e);
            NodePayload {
                text: output.text,
                json: None,
                meta,
            }
        }
    };
    Ok(ExecOutcome::payload(payload))
}

fn build_prompt(schema: &str, merged: &str) -> String {
    format!(
        "Extract structured data from the INPUT. Respond with raw JSON only — no prose, \
         no markdown fences — matching this schema:\n{}\n\nINPUT:\n{}",
        schema, merged
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_schema_and_input() {
        let prompt = build_prompt("{\"name\": \"string\"}", "Alice went home");
        assert!(prompt.contains("{\"name\": \"string\"}"));
        assert!(prompt.contains("Alice went home"));
    }
}
