//! The shared chat round-trip used by gateway-backed executors
//!
//! Agent, merge, judge, and extract nodes all follow the same protocol:
//! reset the node's session, optionally pin a model, subscribe to chat
//! events filtered by session key, send, then consume cumulative deltas
//! until the turn finishes. Deltas are re-sliced into suffixes before they
//! reach the run event stream.

use crate::context::{ChatHandle, ExecutorContext};
use clawdini_core::{Error, Purpose, Result, RunEvent, SessionKey};
use clawdini_gateway::{ChatSendOptions, ChatState, DeltaTracker};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Hard ceiling on one chat turn.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

const THINKING_PREVIEW_CHARS: usize = 96;

/// How a [`call`] should behave for its node kind.
pub struct ChatCall {
    pub agent_id: String,
    pub purpose: Purpose,
    pub model_id: Option<String>,
    /// Return accumulated text instead of failing when the timeout fires
    /// after some output was observed.
    pub partial_ok: bool,
}

/// Outcome of a completed chat turn.
pub struct ChatOutput {
    pub text: String,
    pub session_key: SessionKey,
    pub latency_ms: u64,
}

/// Run one chat turn for `node_id`, streaming delta suffixes into the run
/// event stream. The in-flight record is always cleared on return.
pub async fn call(
    ctx: &ExecutorContext,
    node_id: &str,
    prompt: &str,
    opts: ChatCall,
) -> Result<ChatOutput> {
    let session_key = SessionKey::for_node(&opts.agent_id, opts.purpose, &ctx.run_id, node_id);

    // A nonexistent session is expected on first use
    if let Err(e) = ctx.gateway.sessions_reset(&session_key).await {
        debug!("session reset for {} failed (ignored): {}", session_key, e);
    }
    if let Some(model_id) = &opts.model_id {
        ctx.gateway
            .sessions_patch(&session_key, json!({ "model": model_id }))
            .await?;
    }

    // Subscribe before sending so no event can slip past
    let mut chat_rx = ctx.gateway.subscribe_chat();

    let started = Instant::now();
    let chat_run_id = ctx
        .gateway
        .chat_send(&session_key, prompt, ChatSendOptions::new())
        .await?;
    // Keyed by run and node so child runners share the table without clashes
    let inflight_key = format!("{}:{}", ctx.run_id, node_id);
    ctx.inflight.insert(
        inflight_key.clone(),
        ChatHandle {
            chat_run_id,
            session_key: session_key.clone(),
        },
    );

    let result = wait_for_final(ctx, node_id, &session_key, &mut chat_rx, opts.partial_ok).await;
    ctx.inflight.remove(&inflight_key);

    result.map(|text| ChatOutput {
        text,
        session_key,
        latency_ms: started.elapsed().as_millis() as u64,
    })
}

async fn wait_for_final(
    ctx: &ExecutorContext,
    node_id: &str,
    session_key: &SessionKey,
    chat_rx: &mut tokio::sync::broadcast::Receiver<clawdini_gateway::ChatEvent>,
    partial_ok: bool,
) -> Result<String> {
    let mut tracker = DeltaTracker::new();
    let deadline = tokio::time::sleep(CHAT_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                if partial_ok && !tracker.full().is_empty() {
                    warn!("chat for node {} timed out with partial output", node_id);
                    return Ok(tracker.full().to_string());
                }
                return Err(Error::timeout(
                    format!("chat for node {}", node_id),
                    CHAT_TIMEOUT.as_millis() as u64,
                ));
            }
            _ = ctx.cancel.cancelled() => {
                return Err(Error::node(node_id, "run cancelled"));
            }
            event = chat_rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        warn!("chat subscriber for node {} lagged, dropped {} events", node_id, n);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        return Err(Error::Transport("gateway event stream closed".into()));
                    }
                };
                if !event.matches_session(session_key) {
                    continue;
                }

                match event.state {
                    ChatState::Delta | ChatState::Final => {
                        if let Some(text) = event.text() {
                            let suffix = tracker.advance(&text);
                            if !suffix.is_empty() {
                                ctx.events.emit(RunEvent::node_delta(node_id, suffix));
                                ctx.events.emit(RunEvent::thinking(
                                    node_id,
                                    preview(tracker.full()),
                                ));
                            }
                        }
                        if event.state == ChatState::Final {
                            return Ok(tracker.full().to_string());
                        }
                    }
                    ChatState::Error => {
                        let message = event
                            .error_message
                            .unwrap_or_else(|| "chat failed".to_string());
                        return Err(Error::node(node_id, message));
                    }
                    ChatState::Aborted => {
                        return Err(Error::node(node_id, "chat aborted"));
                    }
                }
            }
        }
    }
}

/// Trailing slice of the cumulative text, kept short for the canvas.
fn preview(full: &str) -> String {
    let chars: Vec<char> = full.chars().collect();
    if chars.len() <= THINKING_PREVIEW_CHARS {
        full.to_string()
    } else {
        chars[chars.len() - THINKING_PREVIEW_CHARS..].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview("hello"), "hello");
    }

    #[test]
    fn preview_takes_trailing_window() {
        let long: String = "x".repeat(200) + "END";
        let p = preview(&long);
        assert_eq!(p.chars().count(), THINKING_PREVIEW_CHARS);
        assert!(p.ends_with("END"));
    }
}
