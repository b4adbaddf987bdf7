//! HTTP surface — run lifecycle over REST + server-sent events

use crate::registry::RunRegistry;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clawdini_core::{Graph, RunEvent};
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

pub fn router(registry: Arc<RunRegistry>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/runs", post(start_run_handler))
        .route("/api/runs/:run_id/events", get(subscribe_handler))
        .route("/api/runs/:run_id/cancel", post(cancel_handler))
        .route("/api/agents", get(agents_handler))
        .route("/api/models", get(models_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(registry)
}

async fn health_handler(State(registry): State<Arc<RunRegistry>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "activeRuns": registry.active_runs(),
    }))
}

#[derive(Debug, Deserialize)]
struct StartRunBody {
    graph: Graph,
    #[serde(default)]
    input: Option<String>,
}

async fn start_run_handler(
    State(registry): State<Arc<RunRegistry>>,
    Json(body): Json<StartRunBody>,
) -> impl IntoResponse {
    let run_id = registry.start(body.graph, body.input);
    Json(serde_json::json!({ "runId": run_id }))
}

async fn cancel_handler(
    State(registry): State<Arc<RunRegistry>>,
    AxumPath(run_id): AxumPath<String>,
) -> impl IntoResponse {
    match registry.cancel(&run_id).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

/// Stream a run's events: a `connected` preamble, the replayed buffer, then
/// live events until the run terminates.
async fn subscribe_handler(
    State(registry): State<Arc<RunRegistry>>,
    AxumPath(run_id): AxumPath<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    let (snapshot, mut live) = registry
        .subscribe(&run_id)
        .map_err(|_| StatusCode::NOT_FOUND)?;

    let stream = async_stream::stream! {
        yield sse_json(&RunEvent::Connected { run_id: run_id.clone() });

        let mut terminal_seen = false;
        for event in snapshot {
            terminal_seen = terminal_seen || event.is_terminal();
            yield sse_json(&event);
        }
        while !terminal_seen {
            match live.recv().await {
                Ok(event) => {
                    terminal_seen = event.is_terminal();
                    yield sse_json(&event);
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("subscriber for run {} lagged, dropped {} events", run_id, n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_json(event: &RunEvent) -> Result<SseEvent, Infallible> {
    // RunEvent serialization cannot fail; fall back to an empty object
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".into());
    Ok(SseEvent::default().data(data))
}

async fn agents_handler(State(registry): State<Arc<RunRegistry>>) -> impl IntoResponse {
    match registry.gateway().request("agents.list", serde_json::json!({})).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

async fn models_handler(State(registry): State<Arc<RunRegistry>>) -> impl IntoResponse {
    match registry.gateway().request("models.list", serde_json::json!({})).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}
