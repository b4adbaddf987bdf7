//! Invoke node — calls an arbitrary gateway command

use super::{merged_text, parse_config};
use crate::context::{EdgeInput, ExecOutcome, ExecutorContext};
use clawdini_core::{Error, Node, NodePayload, Result};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeConfig {
    #[serde(default)]
    command_name: String,
    #[serde(default)]
    payload_template: String,
}

pub(super) async fn execute(
    ctx: &ExecutorContext,
    node: &Node,
    inputs: &[EdgeInput],
) -> Result<ExecOutcome> {
    let config: InvokeConfig = parse_config(node)?;
    if config.command_name.is_empty() {
        return Err(Error::node(&node.id, "no command configured"));
    }

    let substituted = config
        .payload_template
        .replace("{INPUT}", &json_escape(&merged_text(inputs)));

    // A template that renders to valid JSON becomes the params directly;
    // anything else is wrapped
    let params = match serde_json::from_str::<Value>(&substituted) {
        Ok(value) => value,
        Err(_) => json!({ "payload": substituted }),
    };

    let result = ctx
        .gateway
        .request(&config.command_name, params)
        .await
        .map_err(|e| Error::node(&node.id, format!("{} failed: {}", config.command_name, e)))?;

    let payload = match result {
        Value::String(s) => NodePayload::from_text(s),
        Value::Null => NodePayload::default(),
        structured => {
            let text = structured.to_string();
            NodePayload::from_text(text).with_json(structured)
        }
    };
    Ok(ExecOutcome::payload(payload))
}

/// Escape upstream text for substitution inside a JSON string literal.
fn json_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_json_metacharacters() {
        assert_eq!(json_escape("a\"b"), "a\\\"b");
        assert_eq!(json_escape("line1\nline2"), "line1\\nline2");
        assert_eq!(json_escape("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn escaped_text_survives_a_json_template() {
        let template = r#"{ "query": "{INPUT}" }"#;
        let substituted = template.replace("{INPUT}", &json_escape("say \"hi\"\nplease"));
        let parsed: Value = serde_json::from_str(&substituted).unwrap();
        assert_eq!(parsed["query"], "say \"hi\"\nplease");
    }
}
