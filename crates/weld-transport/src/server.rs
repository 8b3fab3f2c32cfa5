//! WebSocket transport server using Axum.
//!
//! Handles HTTP upgrade to WebSocket, connect-time header capture, and
//! frame routing between the socket and the runtime's `SparkHandler`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use weld_protocol::{ClientFrame, ServerFrame, WeldError};

/// Trait implemented by the runtime to handle connection lifecycle and
/// inbound frames. One `on_connect` and one `on_disconnect` per connection;
/// `on_frame` for every parsed frame in between, in arrival order.
pub trait SparkHandler: Send + Sync + 'static {
    fn on_connect(
        &self,
        id: String,
        headers: HashMap<String, String>,
        sender: SparkSender,
    ) -> impl std::future::Future<Output = ()> + Send;

    fn on_frame(
        &self,
        id: &str,
        frame: ClientFrame,
    ) -> impl std::future::Future<Output = ()> + Send;

    fn on_disconnect(&self, id: &str) -> impl std::future::Future<Output = ()> + Send;
}

/// Handle for sending frames to one connection. Cheap to clone; sends are
/// queued and written by the connection's socket task.
#[derive(Clone)]
pub struct SparkSender {
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl SparkSender {
    /// Create a detached sender/receiver pair. The transport builds one per
    /// socket; embedders driving a `SparkHandler` directly (and tests) use
    /// this to stand in for the socket task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a frame. Returns false if the connection is closing; callers
    /// treat delivery as best-effort.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

impl std::fmt::Debug for SparkSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparkSender").finish_non_exhaustive()
    }
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            hostname: "127.0.0.1".into(),
            max_connections: Some(256),
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: SparkHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    /// Connected client count (for the limit check and health endpoint)
    client_count: Arc<std::sync::atomic::AtomicUsize>,
}

/// The transport server — accepts WebSocket connections and shuttles frames
/// between sockets and the handler.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Start the transport server with the given handler.
    pub async fn start<H: SparkHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let state = Arc::new(AppState {
            handler,
            config: config.clone(),
            client_count: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        });

        let app = Router::new()
            .route("/ws", get(ws_upgrade_handler::<H>))
            .route("/health", get(health_handler::<H>))
            .with_state(state);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("Weld transport listening on ws://{}:{}/ws", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Weld transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler<H: SparkHandler>(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    // Check connection limit
    if let Some(max) = state.config.max_connections {
        let current = state.client_count.load(std::sync::atomic::Ordering::Relaxed);
        if current >= max {
            warn!("Connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    // Capture handshake headers; the session bridge replays them later.
    let captured = capture_headers(&headers);

    ws.on_upgrade(move |socket| handle_ws_connection(socket, captured, state))
        .into_response()
}

async fn health_handler<H: SparkHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.client_count.load(std::sync::atomic::Ordering::Relaxed),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_ws_connection<H: SparkHandler>(
    socket: WebSocket,
    headers: HashMap<String, String>,
    state: Arc<AppState<H>>,
) {
    state.client_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let spark_id = uuid::Uuid::new_v4().to_string();
    info!("Spark connected: {spark_id}");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerFrame>();
    state
        .handler
        .on_connect(spark_id.clone(), headers, SparkSender { tx: outbound_tx })
        .await;

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming WebSocket message
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => state.handler.on_frame(&spark_id, frame).await,
                            Err(e) => {
                                let frame = ServerFrame::error(
                                    None,
                                    WeldError::parse_error(format!("Unparseable frame: {e}")),
                                );
                                if let Ok(json) = serde_json::to_string(&frame) {
                                    let _ = ws_tx.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Spark disconnected: {spark_id}");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {spark_id}: {e}");
                        break;
                    }
                    _ => {}
                }
            }

            // Outbound frames queued by the runtime
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Ok(json) = serde_json::to_string(&frame) {
                            if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                                warn!("Failed to send to {spark_id}: {e}");
                                break;
                            }
                        }
                    }
                    // Runtime dropped the sender — nothing left to deliver.
                    None => break,
                }
            }
        }
    }

    state.handler.on_disconnect(&spark_id).await;
    state.client_count.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    info!("Spark closed: {spark_id} (total: {})",
        state.client_count.load(std::sync::atomic::Ordering::Relaxed));
}

/// Lower-case header names; non-UTF-8 values are dropped.
fn capture_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}
