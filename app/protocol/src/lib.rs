//! Abusim wire protocol types shared between the coordinator and agents.
//!
//! Every frame on an agent connection carries one [`Message`]. The message
//! kind decides the payload shape, so the enum is adjacently tagged:
//!
//! ```text
//! {"type": "INPUT_REQUEST", "payload": {"input": "increment x"}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use agent::{
    AgentConfiguration, ConfigError, DEFAULT_MEMORY_CONTROLLER, DEFAULT_TICK, format_tick,
    parse_tick,
};

pub mod agent;
pub mod codec;

/// Messages exchanged between the coordinator and an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Acknowledges an `INIT`.
    Ack,
    /// First message of every agent connection.
    Init {
        /// Name the agent registers under.
        name: String,
    },
    /// Ask the agent for its memory snapshot.
    MemoryRequest,
    /// Memory snapshot and pending rule effects.
    MemoryResponse {
        /// Current resources, one map per primitive kind.
        memory: MemoryResources,
        /// Pending effects grouped by rule.
        #[serde(default)]
        pool: Pool,
    },
    /// Feed agent-specific action text into the agent.
    InputRequest {
        /// Action text, interpreted by the agent.
        input: String,
    },
    /// Result of an input request; an empty error means accepted.
    InputResponse {
        /// Rejection reason, empty on success.
        #[serde(default)]
        error: String,
    },
    /// Ask the agent for its configuration.
    ConfigRequest,
    /// The agent configuration.
    ConfigResponse {
        /// Configuration the agent was started with.
        agent: AgentConfiguration,
    },
    /// Ask the agent for its debugger status.
    DebugRequest,
    /// Current debugger status.
    DebugResponse(DebugStatus),
    /// Replace the debugger status.
    DebugChangeRequest(DebugStatus),
    /// Debugger status was replaced.
    DebugChangeResponse,
    /// Advance a paused agent by one step.
    DebugStepRequest,
    /// The step was performed.
    DebugStepResponse,
}

impl Message {
    /// The kind of this message.
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Ack => MessageType::Ack,
            Self::Init { .. } => MessageType::Init,
            Self::MemoryRequest => MessageType::MemoryRequest,
            Self::MemoryResponse { .. } => MessageType::MemoryResponse,
            Self::InputRequest { .. } => MessageType::InputRequest,
            Self::InputResponse { .. } => MessageType::InputResponse,
            Self::ConfigRequest => MessageType::ConfigRequest,
            Self::ConfigResponse { .. } => MessageType::ConfigResponse,
            Self::DebugRequest => MessageType::DebugRequest,
            Self::DebugResponse(_) => MessageType::DebugResponse,
            Self::DebugChangeRequest(_) => MessageType::DebugChangeRequest,
            Self::DebugChangeResponse => MessageType::DebugChangeResponse,
            Self::DebugStepRequest => MessageType::DebugStepRequest,
            Self::DebugStepResponse => MessageType::DebugStepResponse,
        }
    }
}

/// Payload-free discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    Ack,
    Init,
    MemoryRequest,
    MemoryResponse,
    InputRequest,
    InputResponse,
    ConfigRequest,
    ConfigResponse,
    DebugRequest,
    DebugResponse,
    DebugChangeRequest,
    DebugChangeResponse,
    DebugStepRequest,
    DebugStepResponse,
}

impl MessageType {
    /// The message kind expected in reply to `self`, if `self` expects one.
    pub fn response_to(self) -> Option<MessageType> {
        match self {
            Self::Init => Some(Self::Ack),
            Self::MemoryRequest => Some(Self::MemoryResponse),
            Self::InputRequest => Some(Self::InputResponse),
            Self::ConfigRequest => Some(Self::ConfigResponse),
            Self::DebugRequest => Some(Self::DebugResponse),
            Self::DebugChangeRequest => Some(Self::DebugChangeResponse),
            Self::DebugStepRequest => Some(Self::DebugStepResponse),
            _ => None,
        }
    }

    /// Wire name, as it appears in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ack => "ACK",
            Self::Init => "INIT",
            Self::MemoryRequest => "MEMORY_REQUEST",
            Self::MemoryResponse => "MEMORY_RESPONSE",
            Self::InputRequest => "INPUT_REQUEST",
            Self::InputResponse => "INPUT_RESPONSE",
            Self::ConfigRequest => "CONFIG_REQUEST",
            Self::ConfigResponse => "CONFIG_RESPONSE",
            Self::DebugRequest => "DEBUG_REQUEST",
            Self::DebugResponse => "DEBUG_RESPONSE",
            Self::DebugChangeRequest => "DEBUG_CHANGE_REQUEST",
            Self::DebugChangeResponse => "DEBUG_CHANGE_RESPONSE",
            Self::DebugStepRequest => "DEBUG_STEP_REQUEST",
            Self::DebugStepResponse => "DEBUG_STEP_RESPONSE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory snapshot of an agent, one map per primitive kind.
///
/// Keys are unique within a kind; the same name may appear under two kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryResources {
    /// Boolean resources.
    #[serde(rename = "bool")]
    pub boolean: BTreeMap<String, bool>,
    /// Integer resources.
    pub integer: BTreeMap<String, i64>,
    /// Floating point resources.
    pub float: BTreeMap<String, f64>,
    /// Text resources.
    pub text: BTreeMap<String, String>,
    /// Timestamp resources (RFC 3339 on the wire).
    pub time: BTreeMap<String, DateTime<Utc>>,
}

impl MemoryResources {
    /// True when no kind holds any resource.
    pub fn is_empty(&self) -> bool {
        self.boolean.is_empty()
            && self.integer.is_empty()
            && self.float.is_empty()
            && self.text.is_empty()
            && self.time.is_empty()
    }
}

/// A pending effect of an evaluated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolElem {
    /// Resource the effect writes.
    #[serde(rename = "res")]
    pub resource: String,
    /// Value to be written, rendered by the agent.
    #[serde(rename = "val")]
    pub value: String,
}

/// Pending effects, one group per fired rule, in firing order.
pub type Pool = Vec<Vec<PoolElem>>;

/// Debugger state of an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugStatus {
    /// Whether the agent waits for step requests.
    pub paused: bool,
    /// Log verbosity level, interpreted by the agent.
    #[serde(default)]
    pub verbosity: String,
}
