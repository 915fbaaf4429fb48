//! Abusim coordinator: registers simulated agents over TCP and relays
//! HTTP requests to them, one exchange at a time.

pub mod acceptor;
pub mod api;
pub mod config;
pub mod connection;
pub mod pipeline;
pub mod registry;
pub mod serve;
pub mod utils;

pub use config::CoordinatorConfig;
pub use connection::{AgentConnection, ConnectionError};
pub use pipeline::{Action, ActionError, ActionResponse, Pipeline, Reply};
pub use registry::Registry;
pub use serve::{ServeHandle, serve, serve_with_config};
