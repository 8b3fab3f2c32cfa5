//! Welding — resource channel server.
//!
//! Glues a request/response host to persistent multiplexed WebSocket
//! connections: named resources become addressable groups of connections
//! with per-connection method dispatch and group broadcast, and each
//! connection can resolve the session the host would have computed for an
//! ordinary HTTP request.
//!
//! This binary wires the runtime with a built-in `chat` resource and a
//! header-based session pipeline so the server runs end-to-end out of the
//! box. Applications embedding the runtime supply their own resources and a
//! `SessionPipeline` backed by their real session middleware.
//!
//! Usage:
//!   welding                                  # Default port 8787
//!   welding --port 9000                      # Custom port
//!   welding --session-timeout-ms 0           # Wait on the pipeline forever

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;
use weld_server::{
    CallContext, MethodResult, MethodTable, ResourceDefinition, ResourceRegistry, WeldServer,
};
use weld_session::{
    SessionBridge, SessionBridgeConfig, SessionPipeline, SessionRequest, SessionWriter,
};
use weld_transport::{TransportConfig, TransportServer};

#[derive(Parser, Debug)]
#[command(name = "welding", about = "Welding — resource channel server")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8787")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "256")]
    max_connections: usize,

    /// Internal path carried by synthetic session requests
    #[arg(long, default_value = weld_protocol::DEFAULT_SESSION_ROUTE)]
    session_route: String,

    /// Deadline for session resolution in milliseconds (0 waits forever)
    #[arg(long, default_value = "30000")]
    session_timeout_ms: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// Demo pipeline: derives the session from the connection's handshake
/// headers instead of a real middleware stack. A host embedding the runtime
/// replaces this with a pipeline that replays the request through its
/// session middleware and calls `write_session` with the result.
struct HeaderSessionPipeline;

impl SessionPipeline for HeaderSessionPipeline {
    fn submit(&self, request: SessionRequest, writer: SessionWriter) {
        let session = match request.headers.get("x-welding-user") {
            Some(user) => json!({ "user": user }),
            None => json!({}),
        };
        writer.write_session(session);
    }
}

/// Built-in chat resource: broadcasts messages attributed via the session.
struct ChatRoom;

impl ResourceDefinition for ChatRoom {
    fn methods(&self) -> MethodTable {
        MethodTable::new()
            .method("say", |ctx: CallContext, args: Vec<Value>| async move {
                let text = args.into_iter().next().unwrap_or(Value::Null);
                let session = ctx.session().await?;
                let from = session
                    .get("user")
                    .cloned()
                    .unwrap_or_else(|| json!("anonymous"));
                ctx.broadcast("message", vec![json!({ "from": from, "text": text })]);
                MethodResult::Ok(())
            })
            .method("whoami", |ctx: CallContext, _args: Vec<Value>| async move {
                let session = ctx.session().await?;
                ctx.send("you", vec![session]);
                MethodResult::Ok(())
            })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let timeout =
        (cli.session_timeout_ms > 0).then(|| Duration::from_millis(cli.session_timeout_ms));
    let bridge = Arc::new(SessionBridge::new(
        Arc::new(HeaderSessionPipeline),
        SessionBridgeConfig {
            route_path: cli.session_route,
            timeout,
        },
    ));

    let registry = Arc::new(ResourceRegistry::new(bridge));
    registry.get_or_create("chat", Arc::new(ChatRoom))?;

    let server = Arc::new(WeldServer::new(registry));
    let config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname,
        max_connections: Some(cli.max_connections),
    };
    let mut transport = TransportServer::start(config, server)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start transport: {e}"))?;

    info!("welding ready on port {}", transport.port());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    transport.stop().await;
    Ok(())
}
