//! Lifecycle tests: listeners, end-to-end requests and shutdown.

mod common;

use client::{AgentClient, ClientConfig};
use common::{FakeAgent, start, wait_registered};
use protocol::{Message, codec};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn http_listener_serves_api() {
    let handle = start().await;
    let response = http_get(handle.http_addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with(abusim_coordinator::api::WELCOME));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn agent_reachable_over_http() {
    let handle = start().await;
    let client = AgentClient::new(ClientConfig::default())
        .coordinator(handle.agent_addr.to_string())
        .name("alice");
    let conn = client.connect().await.unwrap();
    wait_registered(handle.registry(), "alice").await;
    let agent = tokio::spawn(async move {
        let mut handler = FakeAgent::new("alice");
        conn.serve(&mut handler).await
    });

    let response = http_get(handle.http_addr, "/config/alice").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("\"memorycontroller\":\"basic\""));

    let response = http_get(handle.http_addr, "/config/bob").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found"));

    handle.shutdown().await.unwrap();
    agent.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_closes_agents_and_listeners() {
    let handle = start().await;
    let agent_addr = handle.agent_addr;
    let http_addr = handle.http_addr;

    let mut conn = client::Connection::connect(agent_addr, "alice").await.unwrap();
    wait_registered(handle.registry(), "alice").await;
    let registry = Arc::clone(handle.registry());

    handle.shutdown().await.unwrap();

    assert!(registry.is_empty());
    assert!(conn.next_request().await.unwrap().is_none());
    assert!(TcpStream::connect(agent_addr).await.is_err());
    assert!(TcpStream::connect(http_addr).await.is_err());
}

#[tokio::test]
async fn shutdown_aborts_pending_handshakes() {
    let handle = start().await;
    let registry = Arc::clone(handle.registry());
    let mut late = TcpStream::connect(handle.agent_addr).await.unwrap();
    // Let the acceptor pick up the socket before it is told to stop.
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.shutdown().await.unwrap();

    let init = Message::Init {
        name: "late".to_owned(),
    };
    let _ = codec::write_message(&mut late, &init).await;
    assert!(codec::read_message::<_, Message>(&mut late).await.is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(registry.is_empty());
}
