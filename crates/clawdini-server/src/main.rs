//! Clawdini — workflow orchestrator for the agent gateway

use anyhow::Context;
use clap::Parser;
use clawdini_gateway::{ClientInfo, ConnectOptions, GatewayClient};
use clawdini_server::http;
use clawdini_server::RunRegistry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum BindMode {
    Loopback,
    #[default]
    Lan,
}

impl BindMode {
    fn to_addr(self) -> &'static str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "clawdini", about = "Graph workflow orchestrator for the agent gateway")]
struct Args {
    /// Port for the run-submission API
    #[arg(long, env = "CLAWDINI_PORT", default_value_t = 8791)]
    port: u16,

    /// Bind address mode
    #[arg(long, value_enum, default_value_t = BindMode::Lan)]
    bind: BindMode,

    /// Gateway WebSocket URL
    #[arg(long, env = "CLAWDINI_GATEWAY_URL", default_value = "ws://127.0.0.1:18789")]
    gateway_url: String,

    /// Gateway auth token
    #[arg(long, env = "CLAWDINI_GATEWAY_TOKEN")]
    token: Option<String>,

    /// Device identity file path
    #[arg(long, env = "CLAWDINI_IDENTITY")]
    identity: Option<PathBuf>,
}

fn default_identity_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home)
        .join(".clawdini")
        .join("identity")
        .join("device.json")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CLAWDINI_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let identity_path = args.identity.clone().unwrap_or_else(default_identity_path);

    info!("Clawdini v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Gateway:  {}", args.gateway_url);
    info!("  Identity: {}", identity_path.display());

    let gateway = GatewayClient::connect(ConnectOptions {
        url: args.gateway_url.clone(),
        token: args.token.clone(),
        identity_path,
        client: ClientInfo::default(),
    })
    .await
    .with_context(|| format!("gateway handshake with {} failed", args.gateway_url))?;

    let registry = Arc::new(RunRegistry::new(Arc::new(gateway)));
    let app = http::router(Arc::clone(&registry));

    let bind_addr: SocketAddr = format!("{}:{}", args.bind.to_addr(), args.port)
        .parse()
        .context("invalid bind address")?;
    info!("  API:      http://{}", bind_addr);
    info!("  Events:   GET /api/runs/:id/events");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
