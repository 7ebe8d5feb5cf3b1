//! End-to-end tests of the server shell over real sockets.

use futures_util::{SinkExt, StreamExt};
use haul_server::pipeline::StatusPage;
use haul_server::{BuildCallbacks, DevServer, Pipeline, ServerConfig, StatsSnapshot};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    server: DevServer,
    addr: SocketAddr,
    task: JoinHandle<haul_server::Result<()>>,
}

async fn start_server() -> TestServer {
    let server = DevServer::new(
        ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        },
        BuildCallbacks::new(),
    );

    let bound = server
        .bind(Pipeline::default().with(StatusPage))
        .await
        .unwrap();
    let addr = bound.local_addr();
    let task = tokio::spawn(bound.serve());

    TestServer { server, addr, task }
}

async fn connect(addr: SocketAddr, path: &str) -> Ws {
    let (ws, _response) = connect_async(format!("ws://{}{}", addr, path))
        .await
        .unwrap();
    ws
}

async fn next_message(ws: &mut Ws) -> Message {
    tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("websocket error")
}

async fn next_json(ws: &mut Ws) -> serde_json::Value {
    match next_message(ws).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text frame, got {:?}", other),
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

fn rejected_status(err: tungstenite::Error) -> u16 {
    match err {
        tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected HTTP rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_hmr_client_follows_build_lifecycle() {
    let test = start_server().await;
    let mut client = connect(test.addr, "/hot").await;

    let status = next_json(&mut client).await;
    assert_eq!(status["type"], "status");
    assert_eq!(status["status"], "idle");

    let lifecycle = test.server.lifecycle();
    lifecycle.on_build_start();
    lifecycle.on_build_done(StatsSnapshot {
        hash: "first".to_string(),
        time_ms: 12,
        ..Default::default()
    });

    assert_eq!(next_json(&mut client).await["type"], "compiling");
    let success = next_json(&mut client).await;
    assert_eq!(success["type"], "success");
    assert_eq!(success["hash"], "first");
    assert_eq!(success["time"], 12);
}

#[tokio::test]
async fn test_debugger_relay_end_to_end() {
    let test = start_server().await;
    let mut debugger = connect(test.addr, "/debugger-proxy?role=debugger").await;
    let mut first = connect(test.addr, "/debugger-proxy").await;
    let mut second = connect(test.addr, "/debugger-proxy?role=client").await;

    let channel = test.server.debugger();
    wait_until(|| channel.is_debugger_connected() && channel.runtime_count() == 2).await;

    debugger
        .send(Message::text(r#"{"method":"prepareJSRuntime"}"#))
        .await
        .unwrap();
    for runtime in [&mut first, &mut second] {
        assert_eq!(
            next_message(runtime).await,
            Message::text(r#"{"method":"prepareJSRuntime"}"#)
        );
    }

    first.send(Message::text(r#"{"replyID":1}"#)).await.unwrap();
    assert_eq!(
        next_message(&mut debugger).await,
        Message::text(r#"{"replyID":1}"#)
    );
}

#[tokio::test]
async fn test_second_debugger_evicts_first() {
    let test = start_server().await;
    let mut first = connect(test.addr, "/debugger-proxy?role=debugger").await;
    let channel = test.server.debugger();
    wait_until(|| channel.is_debugger_connected()).await;

    let mut second = connect(test.addr, "/debugger-proxy?role=debugger").await;

    match next_message(&mut first).await {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert_eq!(frame.reason.as_str(), "Another debugger connected");
        }
        other => panic!("expected close frame, got {:?}", other),
    }

    let mut runtime = connect(test.addr, "/debugger-proxy").await;
    wait_until(|| channel.runtime_count() == 1).await;
    runtime.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_message(&mut second).await, Message::text("hello"));
}

#[tokio::test]
async fn test_upgrade_to_unknown_path_rejected() {
    let test = start_server().await;
    let err = connect_async(format!("ws://{}/elsewhere", test.addr))
        .await
        .unwrap_err();
    assert_eq!(rejected_status(err), 404);
}

#[tokio::test]
async fn test_unknown_role_rejected() {
    let test = start_server().await;
    let err = connect_async(format!("ws://{}/debugger-proxy?role=spectator", test.addr))
        .await
        .unwrap_err();
    assert_eq!(rejected_status(err), 400);
    assert_eq!(test.server.debugger().runtime_count(), 0);
}

#[tokio::test]
async fn test_plain_requests_use_pipeline() {
    let test = start_server().await;

    let status = http_get(test.addr, "/status").await;
    assert!(status.starts_with("HTTP/1.1 200"));
    assert!(status.ends_with("packager-status:running"));

    // A channel path without an upgrade is ordinary traffic
    let hot = http_get(test.addr, "/hot").await;
    assert!(hot.starts_with("HTTP/1.1 404"));
    assert!(hot.contains("Cannot GET /hot"));
}

#[tokio::test]
async fn test_shutdown_closes_sockets_and_listener() {
    let test = start_server().await;
    let mut client = connect(test.addr, "/hot").await;
    next_json(&mut client).await;

    test.server.shutdown_handle().shutdown();

    match next_message(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Away),
        other => panic!("expected close frame, got {:?}", other),
    }

    tokio::time::timeout(Duration::from_secs(5), test.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(TcpStream::connect(test.addr).await.is_err());
}
