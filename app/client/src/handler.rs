//! Request handling on the agent side.

use protocol::{AgentConfiguration, DebugStatus, MemoryResources, Message, Pool};

/// What an agent exposes to the coordinator.
pub trait Handler: Send {
    /// Configuration the agent runs with.
    fn config(&mut self) -> AgentConfiguration;

    /// Current memory and pending rule effects.
    fn memory(&mut self) -> (MemoryResources, Pool);

    /// Apply action text. `Err` carries the rejection reason.
    fn input(&mut self, input: &str) -> Result<(), String>;

    /// Current debugger status.
    fn debug_status(&mut self) -> DebugStatus;

    /// Replace the debugger status.
    fn set_debug(&mut self, status: DebugStatus);

    /// Advance one step while paused.
    fn step(&mut self);
}

/// Build the response to `request`, or `None` if it is not a request.
pub fn respond_to<H: Handler + ?Sized>(handler: &mut H, request: &Message) -> Option<Message> {
    let response = match request {
        Message::ConfigRequest => Message::ConfigResponse {
            agent: handler.config(),
        },
        Message::MemoryRequest => {
            let (memory, pool) = handler.memory();
            Message::MemoryResponse { memory, pool }
        }
        Message::InputRequest { input } => Message::InputResponse {
            error: handler.input(input).err().unwrap_or_default(),
        },
        Message::DebugRequest => Message::DebugResponse(handler.debug_status()),
        Message::DebugChangeRequest(status) => {
            handler.set_debug(status.clone());
            Message::DebugChangeResponse
        }
        Message::DebugStepRequest => {
            handler.step();
            Message::DebugStepResponse
        }
        _ => return None,
    };
    Some(response)
}
