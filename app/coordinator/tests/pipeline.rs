//! Action pipeline tests.

mod common;

use abusim_coordinator::config::PipelineConfig;
use abusim_coordinator::{Action, Pipeline, Registry, Reply};
use axum::http::StatusCode;
use common::{raw_agent, spawn_agent, start, test_config, wait_registered, wait_unregistered};
use protocol::{DebugStatus, Message, codec};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

fn get_config(agent: &str) -> Action {
    Action::GetConfig {
        agent: agent.into(),
    }
}

fn submit_input(agent: &str, input: &str) -> Action {
    Action::SubmitInput {
        agent: agent.into(),
        input: input.to_owned(),
    }
}

#[tokio::test]
async fn unknown_agent_is_not_found() {
    let handle = start().await;
    let response = handle.pipeline().submit(get_config("bob")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body,
        Reply::Error {
            error: "unknown agent \"bob\"".to_owned()
        }
    );
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn exchanges_never_overlap() {
    let handle = start().await;
    let mut agent = raw_agent(handle.agent_addr, "alice").await;
    wait_registered(handle.registry(), "alice").await;

    let pipeline = handle.pipeline().clone();
    let first = pipeline.enqueue(get_config("alice"));
    let second = pipeline.enqueue(Action::GetDebug {
        agent: "alice".into(),
    });

    let request: Message = codec::read_message(&mut agent).await.unwrap();
    assert_eq!(request, Message::ConfigRequest);

    // The second request must not be written before the first is answered.
    let early = tokio::time::timeout(
        Duration::from_millis(200),
        codec::read_message::<_, Message>(&mut agent),
    )
    .await;
    assert!(early.is_err());

    codec::write_message(
        &mut agent,
        &Message::ConfigResponse {
            agent: protocol::AgentConfiguration::new("alice"),
        },
    )
    .await
    .unwrap();
    let request: Message = codec::read_message(&mut agent).await.unwrap();
    assert_eq!(request, Message::DebugRequest);
    codec::write_message(&mut agent, &Message::DebugResponse(DebugStatus::default()))
        .await
        .unwrap();

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert!(first.is_success());
    assert!(matches!(first.body, Reply::Config(_)));
    assert!(second.is_success());
    assert!(matches!(second.body, Reply::Debug(_)));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn responses_follow_submission_order() {
    let handle = start().await;
    let _agent = spawn_agent(&handle, "alice").await;

    let pipeline = handle.pipeline();
    let slots: Vec<_> = (0..5)
        .map(|_| pipeline.enqueue(submit_input("alice", "increment x")))
        .collect();
    for slot in slots {
        assert!(slot.await.unwrap().is_success());
    }

    let response = pipeline
        .submit(Action::GetMemory {
            agent: "alice".into(),
        })
        .await;
    let Reply::Memory(view) = response.body else {
        panic!("expected memory, got {:?}", response.body);
    };
    assert_eq!(view.memory.integer["x"], 10);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejected_input_is_bad_request() {
    let handle = start().await;
    let _agent = spawn_agent(&handle, "alice").await;

    let response = handle
        .pipeline()
        .submit(submit_input("alice", "launch rockets"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        Reply::Error {
            error: "unknown resource".to_owned()
        }
    );
    // A rejection keeps the agent registered.
    assert!(handle.registry().get("alice").is_some());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_read_response_is_server_error() {
    let handle = start().await;
    let mut agent = raw_agent(handle.agent_addr, "alice").await;
    wait_registered(handle.registry(), "alice").await;

    let read = handle.pipeline().enqueue(get_config("alice"));
    let _: Message = codec::read_message(&mut agent).await.unwrap();
    agent.write_all(&[0, 0, 0, 3, b'n', b'o', b'!']).await.unwrap();
    let response = read.await.unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    // The stream is out of sync, so the agent is dropped.
    wait_unregistered(handle.registry(), "alice").await;
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn wrong_response_type_keeps_connection() {
    let handle = start().await;
    let mut agent = raw_agent(handle.agent_addr, "alice").await;
    wait_registered(handle.registry(), "alice").await;

    let pipeline = handle.pipeline().clone();
    let read = pipeline.enqueue(get_config("alice"));
    let _: Message = codec::read_message(&mut agent).await.unwrap();
    codec::write_message(&mut agent, &Message::DebugStepResponse)
        .await
        .unwrap();
    let response = read.await.unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        Reply::Error {
            error: "unexpected response".to_owned()
        }
    );

    let write = pipeline.enqueue(submit_input("alice", "increment x"));
    let _: Message = codec::read_message(&mut agent).await.unwrap();
    codec::write_message(&mut agent, &Message::Ack).await.unwrap();
    let response = write.await.unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(handle.registry().get("alice").is_some());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn disconnected_agent_is_unregistered() {
    let handle = start().await;
    let agent = raw_agent(handle.agent_addr, "alice").await;
    wait_registered(handle.registry(), "alice").await;
    drop(agent);

    let response = handle.pipeline().submit(get_config("alice")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    wait_unregistered(handle.registry(), "alice").await;

    let response = handle.pipeline().submit(get_config("alice")).await;
    assert_eq!(
        response.body,
        Reply::Error {
            error: "unknown agent \"alice\"".to_owned()
        }
    );
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_mutation_is_server_error() {
    let handle = start().await;
    let mut agent = raw_agent(handle.agent_addr, "alice").await;
    wait_registered(handle.registry(), "alice").await;

    let pending = handle.pipeline().enqueue(Action::SetDebug {
        agent: "alice".into(),
        status: DebugStatus {
            paused: true,
            verbosity: "debug".into(),
        },
    });
    let request: Message = codec::read_message(&mut agent).await.unwrap();
    assert!(matches!(request, Message::DebugChangeRequest(ref s) if s.paused));
    drop(agent);

    let response = pending.await.unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    wait_unregistered(handle.registry(), "alice").await;
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn silent_agent_times_out() {
    let mut config = test_config();
    config.pipeline.exchange_timeout_ms = Some(100);
    let handle = abusim_coordinator::serve_with_config(&config).await.unwrap();
    let mut agent = raw_agent(handle.agent_addr, "alice").await;
    wait_registered(handle.registry(), "alice").await;

    let pending = handle.pipeline().enqueue(get_config("alice"));
    let _: Message = codec::read_message(&mut agent).await.unwrap();

    let response = pending.await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(handle.registry().get("alice").is_none());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn stopped_worker_is_unavailable() {
    let registry = Arc::new(Registry::new());
    let (pipeline, worker) = Pipeline::spawn(registry, &PipelineConfig::default());
    worker.abort();
    assert!(worker.await.unwrap_err().is_cancelled());

    let response = pipeline.submit(get_config("alice")).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.body,
        Reply::Error {
            error: "action pipeline stopped".to_owned()
        }
    );
}
