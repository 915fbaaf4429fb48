//! Helpers shared by the coordinator integration tests.
#![allow(dead_code)]

use abusim_coordinator::config::ServerConfig;
use abusim_coordinator::{CoordinatorConfig, Registry, ServeHandle, serve_with_config};
use chrono::{TimeZone, Utc};
use client::{Connection, Handler};
use protocol::codec;
use protocol::{AgentConfiguration, DebugStatus, MemoryResources, Message, Pool, PoolElem};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Config listening on ephemeral loopback ports.
pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        server: ServerConfig {
            agent_address: "127.0.0.1:0".to_owned(),
            http_address: "127.0.0.1:0".to_owned(),
        },
        ..CoordinatorConfig::default()
    }
}

/// Start a coordinator on ephemeral ports.
pub async fn start() -> ServeHandle {
    serve_with_config(&test_config()).await.unwrap()
}

/// Wait until `name` shows up in the registry.
pub async fn wait_registered(registry: &Registry, name: &str) {
    for _ in 0..200 {
        if registry.get(name).is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent '{name}' never registered");
}

/// Wait until `name` is gone from the registry.
pub async fn wait_unregistered(registry: &Registry, name: &str) {
    for _ in 0..200 {
        if registry.get(name).is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent '{name}' is still registered");
}

/// In-memory agent with one integer resource `x`.
pub struct FakeAgent {
    pub config: AgentConfiguration,
    pub memory: MemoryResources,
    pub debug: DebugStatus,
    pub steps: u32,
}

impl FakeAgent {
    pub fn new(name: &str) -> Self {
        let mut config = AgentConfiguration::new(name);
        config.add_memory_item("integer:x:5").unwrap();
        config.add_memory_item("bool:lamp").unwrap();
        config.rules = vec!["rule r1 on x for all this.x > 5 do this.lamp = true".to_owned()];
        config.endpoints = vec!["127.0.0.1:6000".to_owned()];
        config.tick = Duration::from_millis(1500);

        let mut memory = MemoryResources::default();
        memory.integer.insert("x".to_owned(), 5);
        memory.boolean.insert("lamp".to_owned(), false);
        memory.time.insert(
            "boot".to_owned(),
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        );

        Self {
            config,
            memory,
            debug: DebugStatus {
                paused: false,
                verbosity: "info".to_owned(),
            },
            steps: 0,
        }
    }
}

impl Handler for FakeAgent {
    fn config(&mut self) -> AgentConfiguration {
        self.config.clone()
    }

    fn memory(&mut self) -> (MemoryResources, Pool) {
        let pool = vec![vec![PoolElem {
            resource: "lamp".to_owned(),
            value: "true".to_owned(),
        }]];
        (self.memory.clone(), pool)
    }

    fn input(&mut self, input: &str) -> Result<(), String> {
        match input {
            "increment x" => {
                *self.memory.integer.entry("x".to_owned()).or_default() += 1;
                Ok(())
            }
            _ => Err("unknown resource".to_owned()),
        }
    }

    fn debug_status(&mut self) -> DebugStatus {
        self.debug.clone()
    }

    fn set_debug(&mut self, status: DebugStatus) {
        self.debug = status;
    }

    fn step(&mut self) {
        self.steps += 1;
        self.memory
            .integer
            .insert("steps".to_owned(), i64::from(self.steps));
    }
}

/// Register a [`FakeAgent`] called `name` and serve it in the background.
pub async fn spawn_agent(handle: &ServeHandle, name: &str) -> JoinHandle<anyhow::Result<()>> {
    let conn = Connection::connect(handle.agent_addr, name).await.unwrap();
    wait_registered(handle.registry(), name).await;
    let mut agent = FakeAgent::new(name);
    tokio::spawn(async move { conn.serve(&mut agent).await })
}

/// Connect with a bare socket and complete the handshake by hand.
pub async fn raw_agent(addr: SocketAddr, name: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    codec::write_message(
        &mut stream,
        &Message::Init {
            name: name.to_owned(),
        },
    )
    .await
    .unwrap();
    let ack: Message = codec::read_message(&mut stream).await.unwrap();
    assert_eq!(ack, Message::Ack);
    stream
}
