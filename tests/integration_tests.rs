//! End-to-end integration tests — real WebSocket connections through the
//! running transport, exercising join/ready, method dispatch, broadcast
//! fan-out, and session resolution from handshake headers.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a test server on a random port with a chat resource whose session
/// comes from the `x-test-user` handshake header.
async fn start_test_server() -> u16 {
    use weld_server::{
        CallContext, MethodResult, MethodTable, ResourceDefinition, ResourceRegistry, WeldServer,
    };
    use weld_session::{
        SessionBridge, SessionBridgeConfig, SessionPipeline, SessionRequest, SessionWriter,
    };
    use weld_transport::{TransportConfig, TransportServer};

    struct HeaderPipeline;

    impl SessionPipeline for HeaderPipeline {
        fn submit(&self, request: SessionRequest, writer: SessionWriter) {
            let session = match request.headers.get("x-test-user") {
                Some(user) => json!({ "user": user }),
                None => json!({}),
            };
            writer.write_session(session);
        }
    }

    struct ChatRoom;

    impl ResourceDefinition for ChatRoom {
        fn methods(&self) -> MethodTable {
            MethodTable::new()
                .method("say", |ctx: CallContext, args: Vec<Value>| async move {
                    let session = ctx.session().await?;
                    let from = session["user"].as_str().unwrap_or("anonymous").to_string();
                    let text = args.first().cloned().unwrap_or(Value::Null);
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

    let bridge = Arc::new(SessionBridge::new(
        Arc::new(HeaderPipeline),
        SessionBridgeConfig::default(),
    ));
    let registry = Arc::new(ResourceRegistry::new(bridge));
    registry.get_or_create("chat", Arc::new(ChatRoom)).unwrap();

    let server = Arc::new(WeldServer::new(registry));

    let config = TransportConfig {
        port: 0, // OS-assigned
        hostname: "127.0.0.1".into(),
        max_connections: Some(16),
    };

    let transport = TransportServer::start(config, server).await.unwrap();
    let port = transport.port();

    // Leak the transport to keep it running for the test duration
    Box::leak(Box::new(transport));

    port
}

/// Connect a client carrying the given `x-test-user` handshake header.
async fn connect_as(port: u16, user: &str) -> Ws {
    let mut request = format!("ws://127.0.0.1:{port}/ws")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-test-user", user.parse().unwrap());
    let (ws, _) = connect_async(request).await.expect("Failed to connect");
    ws
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Read frames until the next JSON text frame, skipping pings.
async fn recv_json(ws: &mut Ws) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timeout waiting for frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn join(ws: &mut Ws, resource: &str) -> Value {
    send_json(ws, json!({ "type": "join", "resource": resource })).await;
    recv_json(ws).await
}

#[tokio::test]
async fn join_announces_ready_with_methods() {
    let port = start_test_server().await;
    let mut ws = connect_as(port, "jane").await;

    let ready = join(&mut ws, "chat").await;
    assert_eq!(ready["type"], "ready");
    assert_eq!(ready["resource"], "chat");
    assert_eq!(ready["methods"], json!(["say", "whoami"]));
}

#[tokio::test]
async fn join_unknown_resource_reports_error() {
    let port = start_test_server().await;
    let mut ws = connect_as(port, "jane").await;

    let reply = join(&mut ws, "nonexistent").await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["resource"], "nonexistent");
    assert_eq!(reply["error"]["code"], 1002);
}

#[tokio::test]
async fn call_resolves_session_from_handshake_header() {
    let port = start_test_server().await;
    let mut ws = connect_as(port, "jane").await;
    join(&mut ws, "chat").await;

    send_json(
        &mut ws,
        json!({ "type": "call", "resource": "chat", "method": "whoami" }),
    )
    .await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "event");
    assert_eq!(reply["resource"], "chat");
    assert_eq!(reply["event"], "you");
    assert_eq!(reply["args"][0]["user"], "jane");
}

#[tokio::test]
async fn broadcast_fans_out_to_every_member() {
    let port = start_test_server().await;
    let mut alice = connect_as(port, "alice").await;
    let mut bob = connect_as(port, "bob").await;
    join(&mut alice, "chat").await;
    join(&mut bob, "chat").await;

    send_json(
        &mut alice,
        json!({
            "type": "call",
            "resource": "chat",
            "method": "say",
            "args": ["hello room"],
        }),
    )
    .await;

    for ws in [&mut alice, &mut bob] {
        let msg = recv_json(ws).await;
        assert_eq!(msg["type"], "event");
        assert_eq!(msg["event"], "message");
        assert_eq!(msg["args"][0]["from"], "alice");
        assert_eq!(msg["args"][0]["text"], "hello room");
    }
}

#[tokio::test]
async fn call_without_join_is_refused() {
    let port = start_test_server().await;
    let mut ws = connect_as(port, "jane").await;

    send_json(
        &mut ws,
        json!({ "type": "call", "resource": "chat", "method": "say", "args": ["hi"] }),
    )
    .await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["error"]["code"], 1004);
}

#[tokio::test]
async fn unknown_method_is_refused() {
    let port = start_test_server().await;
    let mut ws = connect_as(port, "jane").await;
    join(&mut ws, "chat").await;

    send_json(
        &mut ws,
        json!({ "type": "call", "resource": "chat", "method": "shout" }),
    )
    .await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["error"]["code"], 1003);
}

#[tokio::test]
async fn malformed_frame_reports_parse_error() {
    let port = start_test_server().await;
    let mut ws = connect_as(port, "jane").await;

    ws.send(Message::Text("this is not json".into()))
        .await
        .unwrap();

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["resource"].is_null());
    assert_eq!(reply["error"]["code"], 1005);
}

#[tokio::test]
async fn leave_stops_broadcast_delivery() {
    let port = start_test_server().await;
    let mut alice = connect_as(port, "alice").await;
    let mut bob = connect_as(port, "bob").await;
    join(&mut alice, "chat").await;
    join(&mut bob, "chat").await;

    send_json(&mut bob, json!({ "type": "leave", "resource": "chat" })).await;
    // Leave has no acknowledgement; a subsequent refused call proves the
    // bindings are gone.
    send_json(
        &mut bob,
        json!({ "type": "call", "resource": "chat", "method": "say", "args": ["ghost"] }),
    )
    .await;
    let refused = recv_json(&mut bob).await;
    assert_eq!(refused["error"]["code"], 1004);

    send_json(
        &mut alice,
        json!({ "type": "call", "resource": "chat", "method": "say", "args": ["still here"] }),
    )
    .await;
    let msg = recv_json(&mut alice).await;
    assert_eq!(msg["args"][0]["text"], "still here");
}

#[tokio::test]
async fn health_endpoint_reports_connections() {
    let port = start_test_server().await;
    let _ws = connect_as(port, "jane").await;

    // Plain HTTP request over a raw TCP stream; no HTTP client needed.
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .unwrap();
    stream
        .write_all(
            format!("GET /health HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n")
                .as_bytes(),
        )
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let parsed: Value = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(parsed["status"], "ok");
}
