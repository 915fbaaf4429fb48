//! TCP connection from an agent to the coordinator.

use crate::handler::{Handler, respond_to};
use anyhow::{Result, bail};
use protocol::Message;
use protocol::codec::{self, FrameError};
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// A registered connection to the coordinator.
///
/// Not Clone: one connection per agent. The coordinator drives the
/// exchange: the agent reads a request and writes exactly one response.
pub struct Connection {
    name: String,
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Connection {
    /// Connect to the coordinator and register under `name`.
    ///
    /// Sends `INIT` and waits for the `ACK`.
    pub async fn connect(addr: impl ToSocketAddrs, name: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        tracing::debug!("connected to coordinator at {peer}");
        let (reader, writer) = stream.into_split();
        let mut conn = Self {
            name: name.to_owned(),
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        };

        conn.respond(&Message::Init {
            name: name.to_owned(),
        })
        .await?;
        match conn.read_message().await? {
            Some(Message::Ack) => {
                tracing::info!("agent '{name}' registered with coordinator at {peer}");
                Ok(conn)
            }
            Some(other) => bail!("unexpected response to INIT: {}", other.kind()),
            None => bail!("coordinator closed the connection during registration"),
        }
    }

    /// Name this connection registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next request. Returns `None` once the coordinator
    /// closes the connection.
    pub async fn next_request(&mut self) -> Result<Option<Message>> {
        self.read_message().await
    }

    /// Write one message to the coordinator.
    pub async fn respond(&mut self, msg: &Message) -> Result<()> {
        codec::write_message(&mut self.writer, msg).await?;
        Ok(())
    }

    /// Answer requests with `handler` until the coordinator disconnects.
    pub async fn serve<H: Handler>(mut self, handler: &mut H) -> Result<()> {
        while let Some(request) = self.next_request().await? {
            match respond_to(handler, &request) {
                Some(response) => self.respond(&response).await?,
                None => tracing::warn!("ignoring unexpected {} from coordinator", request.kind()),
            }
        }
        tracing::info!("coordinator closed the connection of agent '{}'", self.name);
        Ok(())
    }

    /// Close the connection by dropping both halves.
    pub fn close(self) {
        drop(self);
    }

    async fn read_message(&mut self) -> Result<Option<Message>> {
        match codec::read_message(&mut self.reader).await {
            Ok(msg) => Ok(Some(msg)),
            Err(FrameError::ConnectionClosed) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
