//! Coordinator side of one agent's TCP connection.

use protocol::Message;
use protocol::codec::{self, FrameError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

/// Errors raised by a single send or receive.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection was closed locally or by the agent.
    #[error("connection closed")]
    Closed,
    /// Framing or transport failure.
    #[error(transparent)]
    Frame(FrameError),
    /// The agent did not answer in time.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl From<FrameError> for ConnectionError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::ConnectionClosed => Self::Closed,
            e => Self::Frame(e),
        }
    }
}

impl ConnectionError {
    /// True when the peer sent something that is not a valid frame.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Frame(e) if e.is_protocol())
    }
}

/// A registered agent's connection.
///
/// Reads and writes are serialized by separate locks, so one exchange at a
/// time owns each direction. [`AgentConnection::close`] wakes any exchange
/// in flight, which then fails with [`ConnectionError::Closed`].
pub struct AgentConnection {
    peer: SocketAddr,
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<BufWriter<OwnedWriteHalf>>>,
    closed: watch::Sender<bool>,
}

impl AgentConnection {
    /// Wrap an accepted stream.
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        let (closed, _) = watch::channel(false);
        Ok(Self {
            peer,
            reader: Mutex::new(Some(BufReader::new(reader))),
            writer: Mutex::new(Some(BufWriter::new(writer))),
            closed,
        })
    }

    /// Remote address of the agent.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether [`AgentConnection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Write one message.
    pub async fn send(&self, msg: &Message) -> Result<(), ConnectionError> {
        let mut closed = self.closed.subscribe();
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(ConnectionError::Closed);
        };

        let outcome = tokio::select! {
            result = codec::write_message(writer, msg) => Some(result),
            _ = closed.wait_for(|closed| *closed) => None,
        };
        match outcome {
            Some(result) => result.map_err(ConnectionError::from),
            None => {
                guard.take();
                Err(ConnectionError::Closed)
            }
        }
    }

    /// Read one message, waiting as long as it takes.
    pub async fn receive(&self) -> Result<Message, ConnectionError> {
        self.receive_within(None).await
    }

    /// Read one message, giving up after `limit` if one is set.
    ///
    /// A timeout may leave half a frame unread, so callers must close the
    /// connection after [`ConnectionError::Timeout`].
    pub async fn receive_within(&self, limit: Option<Duration>) -> Result<Message, ConnectionError> {
        let mut closed = self.closed.subscribe();
        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Err(ConnectionError::Closed);
        };

        let read = async move {
            let frame = codec::read_message::<_, Message>(reader);
            match limit {
                Some(limit) => match tokio::time::timeout(limit, frame).await {
                    Ok(result) => result.map_err(ConnectionError::from),
                    Err(_) => Err(ConnectionError::Timeout(limit)),
                },
                None => frame.await.map_err(ConnectionError::from),
            }
        };
        let outcome = tokio::select! {
            result = read => Some(result),
            _ = closed.wait_for(|closed| *closed) => None,
        };
        match outcome {
            Some(result) => result,
            None => {
                guard.take();
                Err(ConnectionError::Closed)
            }
        }
    }

    /// Close the connection. Idempotent.
    ///
    /// Idle halves are dropped immediately; a half held by an exchange is
    /// dropped by that exchange when it wakes up.
    pub fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        tracing::debug!("closed connection to {}", self.peer);
    }
}

impl std::fmt::Debug for AgentConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConnection")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
