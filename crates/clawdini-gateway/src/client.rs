//! Gateway client — one persistent WebSocket, multiplexed RPC + events
//!
//! A single connection serves every runner: writes are serialized through a
//! dedicated sender task, and one reader loop routes response frames to
//! their pending request slots and event frames to subscribers. Event
//! delivery goes through broadcast channels so a slow consumer can never
//! stall the reader.
//!
//! Reconnect is out of scope: once the transport drops, in-flight requests
//! fail with a transport error and runners surface that per node.

use crate::auth::{device_section, ClientInfo};
use crate::chat::ChatEvent;
use crate::identity::DeviceIdentity;
use crate::rpc::Gateway;
use async_trait::async_trait;
use clawdini_core::{decode, encode, Error, Frame, Result};
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, TungMessage>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Bounded wait for the server's `connect.challenge` after the socket opens.
const CHALLENGE_WAIT: Duration = Duration::from_millis(1500);
/// Bounded wait for `hello-ok` after sending `connect`.
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for every other RPC.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Handshake progress, observable via [`GatewayClient::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Opening,
    Challenged,
    Authenticating,
    Ready,
    Failed,
}

/// Connection settings for [`GatewayClient::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub url: String,
    pub token: Option<String>,
    pub identity_path: PathBuf,
    pub client: ClientInfo,
}

struct ClientShared {
    write_tx: mpsc::Sender<TungMessage>,
    pending: Mutex<HashMap<String, oneshot::Sender<Frame>>>,
    req_counter: AtomicU64,
    /// Per-event-name fan-out for generic subscribers.
    events: DashMap<String, broadcast::Sender<Value>>,
    /// Typed fan-out for the one event the engine consumes constantly.
    chat_tx: broadcast::Sender<ChatEvent>,
    state_tx: watch::Sender<ClientState>,
}

impl ClientShared {
    fn set_state(&self, state: ClientState) {
        let _ = self.state_tx.send(state);
    }

    fn event_sender(&self, event: &str) -> broadcast::Sender<Value> {
        self.events
            .entry(event.to_string())
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }
}

/// Client for the remote agent gateway. Cheap to clone; all clones share
/// the underlying connection.
#[derive(Clone)]
pub struct GatewayClient {
    shared: Arc<ClientShared>,
    state_rx: watch::Receiver<ClientState>,
}

impl GatewayClient {
    /// Open the transport, perform the challenge–response handshake, and
    /// return a ready client. Fails on transport errors, a rejected
    /// `connect`, or no `hello-ok` within the bounded wait.
    pub async fn connect(opts: ConnectOptions) -> Result<Self> {
        let identity = DeviceIdentity::load_or_generate(&opts.identity_path)?;

        let (state_tx, state_rx) = watch::channel(ClientState::Opening);
        let (write_tx, write_rx) = mpsc::channel::<TungMessage>(64);
        let (chat_tx, _) = broadcast::channel(1024);

        let parsed = url::Url::parse(&opts.url)
            .map_err(|e| Error::Transport(format!("bad gateway url {}: {}", opts.url, e)))?;
        let (ws_stream, _) = connect_async(parsed)
            .await
            .map_err(|e| Error::Transport(format!("connect to {} failed: {}", opts.url, e)))?;
        let (ws_tx, ws_rx) = ws_stream.split();

        let shared = Arc::new(ClientShared {
            write_tx,
            pending: Mutex::new(HashMap::new()),
            req_counter: AtomicU64::new(0),
            events: DashMap::new(),
            chat_tx,
            state_tx,
        });

        // Subscribe to the challenge before frames can arrive
        let mut challenge_rx = shared.event_sender("connect.challenge").subscribe();

        tokio::spawn(writer_loop(write_rx, ws_tx));
        tokio::spawn(reader_loop(ws_rx, Arc::clone(&shared)));

        let client = Self { shared, state_rx };

        // Step 1: bounded wait for the challenge nonce
        let nonce = match tokio::time::timeout(CHALLENGE_WAIT, challenge_rx.recv()).await {
            Ok(Ok(payload)) => {
                let nonce = payload
                    .get("nonce")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                client.shared.set_state(ClientState::Challenged);
                nonce
            }
            _ => None,
        };

        // Steps 2–4: sign and send connect, wait for hello-ok
        client.shared.set_state(ClientState::Authenticating);
        let signed_at = chrono::Utc::now().timestamp_millis() as u64;
        let device = device_section(
            &identity,
            &opts.client,
            signed_at,
            opts.token.as_deref(),
            nonce.as_deref(),
        );

        let mut params = json!({
            "minProtocol": 3,
            "maxProtocol": 3,
            "role": opts.client.role,
            "scopes": opts.client.scopes,
            "device": device,
            "client": {
                "id": opts.client.id,
                "mode": opts.client.mode,
                "version": env!("CARGO_PKG_VERSION"),
                "platform": std::env::consts::OS,
            },
        });
        if let Some(token) = &opts.token {
            params["auth"] = json!({ "token": token });
        }

        let hello = match client.request_with_timeout("connect", params, HELLO_TIMEOUT).await {
            Ok(payload) => payload,
            Err(e) => {
                client.shared.set_state(ClientState::Failed);
                return Err(match e {
                    Error::Rpc { code, message } => Error::auth(format!("{}: {}", code, message)),
                    Error::Timeout { .. } => Error::auth("no hello-ok within 10s"),
                    other => other,
                });
            }
        };

        if hello.get("type").and_then(|v| v.as_str()) != Some("hello-ok") {
            client.shared.set_state(ClientState::Failed);
            return Err(Error::auth("unexpected connect response"));
        }
        let server = hello.get("server").cloned().unwrap_or(Value::Null);
        info!(
            "gateway ready: server={} connId={} methods={}",
            server.get("version").and_then(|v| v.as_str()).unwrap_or("?"),
            server.get("connId").and_then(|v| v.as_str()).unwrap_or("?"),
            server
                .pointer("/features/methods")
                .and_then(|v| v.as_array())
                .map(|a| a.len())
                .unwrap_or(0),
        );

        client.shared.set_state(ClientState::Ready);
        Ok(client)
    }

    /// Current handshake/connection state.
    pub fn state(&self) -> ClientState {
        *self.state_rx.borrow()
    }

    /// Subscribe to a named gateway event. Payloads arrive as raw JSON.
    pub fn subscribe(&self, event: &str) -> broadcast::Receiver<Value> {
        self.shared.event_sender(event).subscribe()
    }

    async fn request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let n = self.shared.req_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("r{}", n);

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id.clone(), tx);

        let frame = Frame::req(&id, method, Some(params));
        let wire = encode(&frame)?;
        if self
            .shared
            .write_tx
            .send(TungMessage::Text(wire))
            .await
            .is_err()
        {
            self.shared.pending.lock().await.remove(&id);
            return Err(Error::Transport("connection closed".into()));
        }

        let reply = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(_)) => {
                return Err(Error::Transport("connection lost awaiting response".into()));
            }
            Err(_) => {
                self.shared.pending.lock().await.remove(&id);
                return Err(Error::timeout(method, timeout.as_millis() as u64));
            }
        };

        match reply {
            Frame::Res {
                ok: true, payload, ..
            } => Ok(payload.unwrap_or(Value::Null)),
            Frame::Res { error, .. } => {
                let err = error.unwrap_or_else(|| clawdini_core::RpcErrorBody {
                    code: "UNKNOWN".into(),
                    message: "request failed".into(),
                });
                Err(Error::rpc(err.code, err.message))
            }
            other => Err(Error::Protocol(format!(
                "non-response frame routed to request slot: {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.request_with_timeout(method, params, REQUEST_TIMEOUT)
            .await
    }

    fn subscribe_chat(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.chat_tx.subscribe()
    }
}

async fn writer_loop(mut write_rx: mpsc::Receiver<TungMessage>, mut ws_tx: WsSink) {
    while let Some(msg) = write_rx.recv().await {
        if ws_tx.send(msg).await.is_err() {
            warn!("gateway write failed, closing send lane");
            break;
        }
    }
}

async fn reader_loop(mut ws_rx: WsStream, shared: Arc<ClientShared>) {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(TungMessage::Text(text)) => {
                let frame = match decode(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("dropping malformed frame: {}", e);
                        continue;
                    }
                };
                route_frame(frame, &shared).await;
            }
            Ok(TungMessage::Close(_)) => {
                info!("gateway closed the connection");
                break;
            }
            Ok(_) => {} // Binary, Ping, Pong — ignore
            Err(e) => {
                warn!("gateway read error: {}", e);
                break;
            }
        }
    }

    shared.set_state(ClientState::Disconnected);
    // Dropping the senders fails every in-flight request with a transport error
    shared.pending.lock().await.clear();
}

async fn route_frame(frame: Frame, shared: &Arc<ClientShared>) {
    match frame {
        Frame::Res {
            id,
            ok,
            payload,
            error,
        } => {
            let sender = shared.pending.lock().await.remove(&id);
            match sender {
                Some(tx) => {
                    let _ = tx.send(Frame::Res {
                        id,
                        ok,
                        payload,
                        error,
                    });
                }
                None => debug!("response for unknown request id {}", id),
            }
        }
        Frame::Event {
            event,
            payload,
            seq,
        } => {
            if let Some(seq) = seq {
                debug!("event {} seq={}", event, seq);
            }
            let payload = payload.unwrap_or(Value::Null);
            if event == "chat" {
                match ChatEvent::parse(&payload) {
                    Some(chat) => {
                        let _ = shared.chat_tx.send(chat);
                    }
                    None => warn!("unparseable chat event payload"),
                }
            }
            if let Some(tx) = shared.events.get(&event) {
                let _ = tx.send(payload);
            }
        }
        Frame::Req { id, method, .. } => {
            debug!("ignoring server-initiated request {} ({})", id, method);
        }
        Frame::Unknown => {}
    }
}
