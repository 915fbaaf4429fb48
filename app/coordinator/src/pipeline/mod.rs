//! Action pipeline: one worker running agent exchanges in arrival order.
//!
//! HTTP handlers enqueue an [`Action`] with a oneshot reply slot. The
//! worker takes one action at a time, sends the request, waits for the
//! matching response and completes the slot before looking at the next
//! action. No two exchanges ever overlap, on any connection.

pub use action::{Action, ActionResponse, ConfigView, DebugView, MemoryView, PoolEntry, Reply};
pub use error::ActionError;

mod action;
mod error;

use crate::config::PipelineConfig;
use crate::connection::{AgentConnection, ConnectionError};
use crate::registry::Registry;
use protocol::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Job = (Action, oneshot::Sender<ActionResponse>);

/// Cloneable handle for submitting actions to the worker.
#[derive(Debug, Clone)]
pub struct Pipeline {
    tx: mpsc::UnboundedSender<Job>,
}

impl Pipeline {
    /// Start the worker. It runs until every handle is dropped or the
    /// returned task is aborted.
    pub fn spawn(registry: Arc<Registry>, config: &PipelineConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            registry,
            exchange_timeout: config.exchange_timeout(),
        };
        let join = tokio::spawn(worker.run(rx));
        (Self { tx }, join)
    }

    /// Queue `action` and return the slot its response will arrive on.
    ///
    /// The slot errors if the worker has stopped.
    pub fn enqueue(&self, action: Action) -> oneshot::Receiver<ActionResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send((action, reply_tx)).is_err() {
            tracing::debug!("action dropped, pipeline worker has stopped");
        }
        reply_rx
    }

    /// Queue `action` and wait for its response.
    pub async fn submit(&self, action: Action) -> ActionResponse {
        let mutating = action.is_mutating();
        match self.enqueue(action).await {
            Ok(response) => response,
            Err(_) => {
                let e = ActionError::PipelineStopped;
                ActionResponse::error(e.status(mutating), e.to_string())
            }
        }
    }
}

struct Worker {
    registry: Arc<Registry>,
    exchange_timeout: Option<Duration>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Job>) {
        tracing::debug!("action pipeline started");
        while let Some((action, reply)) = rx.recv().await {
            let response = self.execute(&action).await;
            if reply.send(response).is_err() {
                tracing::debug!(
                    "caller of {} on '{}' left before the response",
                    action.label(),
                    action.agent()
                );
            }
        }
        tracing::debug!("action pipeline stopped");
    }

    async fn execute(&self, action: &Action) -> ActionResponse {
        match self.perform(action).await {
            Ok(reply) => ActionResponse::ok(reply),
            Err(e) => {
                match &e {
                    ActionError::UnexpectedResponse { expected, actual } => tracing::error!(
                        "{} on '{}': expected {expected}, got {actual}",
                        action.label(),
                        action.agent()
                    ),
                    ActionError::Rejected(reason) => tracing::info!(
                        "agent '{}' rejected input: {reason}",
                        action.agent()
                    ),
                    e => tracing::warn!("{} failed: {e}", action.label()),
                }
                ActionResponse::error(e.status(action.is_mutating()), e.to_string())
            }
        }
    }

    async fn perform(&self, action: &Action) -> Result<Reply, ActionError> {
        let agent = action.agent();
        let conn = self
            .registry
            .get(agent)
            .ok_or_else(|| ActionError::AgentNotFound(agent.into()))?;

        if let Err(source) = conn.send(&action.request()).await {
            self.drop_connection(agent, &conn, &source);
            return Err(ActionError::Send {
                agent: agent.into(),
                source,
            });
        }
        let response = match conn.receive_within(self.exchange_timeout).await {
            Ok(response) => response,
            Err(source) => {
                self.drop_connection(agent, &conn, &source);
                return Err(ActionError::Receive {
                    agent: agent.into(),
                    source,
                });
            }
        };
        project(action, response)
    }

    /// Close a connection whose exchange failed and unregister it, unless
    /// the name has already been taken over by a newer connection.
    fn drop_connection(
        &self,
        agent: &str,
        conn: &Arc<AgentConnection>,
        cause: &ConnectionError,
    ) {
        tracing::error!("exchange with agent '{agent}' failed: {cause}");
        conn.close();
        if self.registry.remove_if(agent, conn) {
            tracing::warn!("unregistered agent '{agent}'");
        }
    }
}

/// Turn the agent's response into the HTTP reply for `action`.
fn project(action: &Action, response: Message) -> Result<Reply, ActionError> {
    match (action, response) {
        (Action::GetConfig { .. }, Message::ConfigResponse { agent }) => {
            Ok(Reply::Config(ConfigView::from(agent)))
        }
        (Action::GetMemory { agent }, Message::MemoryResponse { memory, pool }) => {
            Ok(Reply::Memory(MemoryView::new(agent.clone(), memory, pool)))
        }
        (Action::SubmitInput { .. }, Message::InputResponse { error }) => {
            if error.is_empty() {
                Ok(Reply::done())
            } else {
                Err(ActionError::Rejected(error))
            }
        }
        (Action::GetDebug { agent }, Message::DebugResponse(status)) => {
            Ok(Reply::Debug(DebugView {
                name: agent.clone(),
                status,
            }))
        }
        (Action::SetDebug { .. }, Message::DebugChangeResponse)
        | (Action::StepDebug { .. }, Message::DebugStepResponse) => Ok(Reply::done()),
        (action, response) => Err(ActionError::UnexpectedResponse {
            expected: action.response_type(),
            actual: response.kind(),
        }),
    }
}
