//! Action failures and their HTTP status.

use crate::connection::ConnectionError;
use axum::http::StatusCode;
use compact_str::CompactString;
use protocol::MessageType;

/// Why an action did not produce a reply.
///
/// Display strings are what HTTP callers see. Transport and frame details
/// stay in the source chain for logs.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// No agent is registered under the name.
    #[error("unknown agent \"{0}\"")]
    AgentNotFound(CompactString),
    /// The request could not be written.
    #[error("agent \"{agent}\" is unreachable")]
    Send {
        agent: CompactString,
        #[source]
        source: ConnectionError,
    },
    /// No valid response could be read.
    #[error("no valid response from agent \"{agent}\"")]
    Receive {
        agent: CompactString,
        #[source]
        source: ConnectionError,
    },
    /// The agent answered with the wrong message type.
    #[error("unexpected response")]
    UnexpectedResponse {
        expected: MessageType,
        actual: MessageType,
    },
    /// The agent refused the input.
    #[error("{0}")]
    Rejected(String),
    /// The pipeline worker is gone.
    #[error("action pipeline stopped")]
    PipelineStopped,
}

impl ActionError {
    /// HTTP status for this failure.
    ///
    /// Malformed or mistyped replies are server errors for every action.
    /// A connection that drops mid-exchange is a server error when the
    /// action changes agent state, and not found otherwise.
    pub fn status(&self, mutating: bool) -> StatusCode {
        match self {
            Self::AgentNotFound(_) | Self::Send { .. } => StatusCode::NOT_FOUND,
            Self::UnexpectedResponse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Receive { source, .. } if source.is_protocol() || mutating => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Receive { .. } => StatusCode::NOT_FOUND,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::PipelineStopped => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
