//! Agent port: accept loop and the registration handshake.

use crate::connection::{AgentConnection, ConnectionError};
use crate::registry::Registry;
use compact_str::CompactString;
use protocol::{Message, MessageType};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

/// Why a new connection was not registered.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("failed to set up connection: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("expected INIT, got {0}")]
    UnexpectedMessage(MessageType),
    #[error("agent name must not be empty")]
    EmptyName,
}

/// Accept agent connections on `listener` until shutdown is signalled.
///
/// Each connection is handshaken on its own task, so a slow agent never
/// delays the others. Handshakes still pending at shutdown are aborted
/// and awaited before this returns, so none can register afterwards.
pub async fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut handshakes = JoinSet::new();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let registry = Arc::clone(&registry);
                        handshakes.spawn(async move {
                            if let Err(e) = register(stream, &registry).await {
                                tracing::warn!("rejected agent connection from {addr}: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("failed to accept agent connection: {e}");
                    }
                }
            }
            Some(_) = handshakes.join_next(), if !handshakes.is_empty() => {}
            _ = &mut shutdown => {
                tracing::info!("agent accept loop shutting down");
                break;
            }
        }
    }
    if !handshakes.is_empty() {
        tracing::debug!("aborting {} pending handshake(s)", handshakes.len());
    }
    handshakes.shutdown().await;
}

/// Run the `INIT`/`ACK` handshake on `stream` and register the agent.
///
/// A name that is already registered is taken over by the new connection
/// and the old one is closed. On error the stream is dropped unregistered.
pub async fn register(
    stream: TcpStream,
    registry: &Registry,
) -> Result<CompactString, HandshakeError> {
    let conn = AgentConnection::new(stream)?;
    let peer = conn.peer_addr();
    tracing::debug!("agent connected from {peer}");

    let name = match conn.receive().await? {
        Message::Init { name } => CompactString::from(name),
        other => return Err(HandshakeError::UnexpectedMessage(other.kind())),
    };
    if name.is_empty() {
        return Err(HandshakeError::EmptyName);
    }
    conn.send(&Message::Ack).await?;

    if let Some(previous) = registry.put(name.clone(), Arc::new(conn)) {
        tracing::warn!(
            "agent '{name}' registered again from {peer}, closing previous connection from {}",
            previous.peer_addr()
        );
        previous.close();
    } else {
        tracing::info!("agent '{name}' registered from {peer}");
    }
    Ok(name)
}
