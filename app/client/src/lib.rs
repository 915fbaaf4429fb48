//! Abusim client library: the agent side of a coordinator connection.
//! Simulated agents use it to register with the coordinator and answer its
//! requests.

pub use connection::Connection;
pub use handler::{Handler, respond_to};

pub mod connection;
pub mod handler;

/// Default coordinator agent port address.
pub const DEFAULT_COORDINATOR: &str = "127.0.0.1:5001";

/// Client configuration for connecting to a coordinator.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator agent address (`host:port`).
    pub coordinator: String,
    /// Name the agent registers under.
    pub name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coordinator: DEFAULT_COORDINATOR.to_owned(),
            name: String::new(),
        }
    }
}

/// Agent-side client for the coordinator.
///
/// Holds configuration. Call [`AgentClient::connect`] to open the
/// connection and perform the registration handshake.
pub struct AgentClient {
    config: ClientConfig,
}

impl AgentClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Access the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Set the coordinator address.
    pub fn coordinator(mut self, addr: impl Into<String>) -> Self {
        self.config.coordinator = addr.into();
        self
    }

    /// Set the agent name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Connect to the coordinator and register under the configured name.
    pub async fn connect(&self) -> anyhow::Result<Connection> {
        if self.config.name.is_empty() {
            anyhow::bail!("agent name must not be empty");
        }
        Connection::connect(self.config.coordinator.as_str(), &self.config.name).await
    }
}
