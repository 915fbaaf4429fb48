//! Actions accepted by the pipeline and the replies they produce.

use axum::http::StatusCode;
use compact_str::CompactString;
use protocol::{
    AgentConfiguration, DebugStatus, MemoryResources, Message, MessageType, Pool, format_tick,
};
use serde::Serialize;

/// One request/response exchange with a named agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Fetch the agent's configuration.
    GetConfig { agent: CompactString },
    /// Fetch the agent's memory and rule pool.
    GetMemory { agent: CompactString },
    /// Hand action text to the agent.
    SubmitInput { agent: CompactString, input: String },
    /// Fetch the debugger status.
    GetDebug { agent: CompactString },
    /// Replace the debugger status.
    SetDebug {
        agent: CompactString,
        status: DebugStatus,
    },
    /// Advance a paused agent by one step.
    StepDebug { agent: CompactString },
}

impl Action {
    /// Name of the target agent.
    pub fn agent(&self) -> &str {
        match self {
            Self::GetConfig { agent }
            | Self::GetMemory { agent }
            | Self::SubmitInput { agent, .. }
            | Self::GetDebug { agent }
            | Self::SetDebug { agent, .. }
            | Self::StepDebug { agent } => agent,
        }
    }

    /// Request sent to the agent.
    pub fn request(&self) -> Message {
        match self {
            Self::GetConfig { .. } => Message::ConfigRequest,
            Self::GetMemory { .. } => Message::MemoryRequest,
            Self::SubmitInput { input, .. } => Message::InputRequest {
                input: input.clone(),
            },
            Self::GetDebug { .. } => Message::DebugRequest,
            Self::SetDebug { status, .. } => Message::DebugChangeRequest(status.clone()),
            Self::StepDebug { .. } => Message::DebugStepRequest,
        }
    }

    /// Response type the agent must answer with.
    pub fn response_type(&self) -> MessageType {
        match self {
            Self::GetConfig { .. } => MessageType::ConfigResponse,
            Self::GetMemory { .. } => MessageType::MemoryResponse,
            Self::SubmitInput { .. } => MessageType::InputResponse,
            Self::GetDebug { .. } => MessageType::DebugResponse,
            Self::SetDebug { .. } => MessageType::DebugChangeResponse,
            Self::StepDebug { .. } => MessageType::DebugStepResponse,
        }
    }

    /// Whether the action changes agent state.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::SubmitInput { .. } | Self::SetDebug { .. })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GetConfig { .. } => "get config",
            Self::GetMemory { .. } => "get memory",
            Self::SubmitInput { .. } => "submit input",
            Self::GetDebug { .. } => "get debug status",
            Self::SetDebug { .. } => "set debug status",
            Self::StepDebug { .. } => "debug step",
        }
    }
}

/// HTTP status plus JSON body for a finished action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub status: StatusCode,
    pub body: Reply,
}

impl ActionResponse {
    /// `200 OK` with `body`.
    pub fn ok(body: Reply) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// A failure with an `{"error": ...}` body.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Reply::Error {
                error: message.into(),
            },
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// JSON body of an [`ActionResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Config(ConfigView),
    Memory(MemoryView),
    Debug(DebugView),
    /// `{"result": "ok"}`
    Done { result: CompactString },
    /// `{"error": "..."}`
    Error { error: String },
}

impl Reply {
    /// The `{"result": "ok"}` body.
    pub fn done() -> Self {
        Self::Done {
            result: "ok".into(),
        }
    }
}

/// Agent configuration as shown over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigView {
    pub name: String,
    #[serde(rename = "memorycontroller")]
    pub memory_controller: String,
    /// Flattened `kind:name:values` items.
    pub memory: Vec<String>,
    pub rules: Vec<String>,
    pub endpoints: Vec<String>,
    /// Human-readable duration, e.g. `1s`.
    pub tick: String,
}

impl From<AgentConfiguration> for ConfigView {
    fn from(agent: AgentConfiguration) -> Self {
        let memory = agent.memory_items();
        Self {
            name: agent.name,
            memory_controller: agent.memory_controller,
            memory,
            rules: agent.rules,
            endpoints: agent.endpoints,
            tick: format_tick(agent.tick),
        }
    }
}

/// Agent memory as shown over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryView {
    pub name: CompactString,
    pub memory: MemoryResources,
    pub pool: Vec<Vec<PoolEntry>>,
}

/// One pending rule effect, with the field names the API uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolEntry {
    pub resource: String,
    pub value: String,
}

impl MemoryView {
    /// Build the view of `agent`'s memory and pool.
    pub fn new(agent: impl Into<CompactString>, memory: MemoryResources, pool: Pool) -> Self {
        let pool = pool
            .into_iter()
            .map(|effects| {
                effects
                    .into_iter()
                    .map(|elem| PoolEntry {
                        resource: elem.resource,
                        value: elem.value,
                    })
                    .collect()
            })
            .collect();
        Self {
            name: agent.into(),
            memory,
            pool,
        }
    }
}

/// Debugger status as shown over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugView {
    pub name: CompactString,
    pub status: DebugStatus,
}
