//! Command handler trait and outcome types.

use serde::Serialize;
use serde_json::Value;

use crate::rpc::RpcError;

/// Side effect requested by a command, applied by the session after the
/// reply has been sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionDirective {
    /// Switch the line to this baud rate after draining the transmitter.
    pub new_baud: Option<u32>,
    /// Restart the agent once this absolute time (milliseconds since
    /// session start) has passed.
    pub reboot_at_ms: Option<u64>,
}

impl ActionDirective {
    pub fn is_empty(&self) -> bool {
        self.new_baud.is_none() && self.reboot_at_ms.is_none()
    }
}

/// Result of executing one command.
#[derive(Debug, Default)]
pub struct CommandOutcome {
    /// Success payload; `None` replies with `{"result": 0}`.
    pub result: Option<Value>,
    /// Failure; takes precedence over `result`.
    pub error: Option<RpcError>,
    /// Deferred side effect. Dropped if `error` is set.
    pub action: ActionDirective,
}

impl CommandOutcome {
    /// Success with a payload.
    pub fn result(value: Value) -> Self {
        Self {
            result: Some(value),
            ..Self::default()
        }
    }

    /// Success with no payload.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Failure.
    pub fn error(error: RpcError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// A registered command handler.
///
/// Handlers run on the session task while the registry lock is held, so
/// they must return promptly. State a handler needs is captured in the
/// closure or carried by the implementing type.
pub trait Command: Send + Sync {
    fn call(&self, params: Option<&Value>) -> CommandOutcome;
}

impl<F> Command for F
where
    F: Fn(Option<&Value>) -> CommandOutcome + Send + Sync,
{
    fn call(&self, params: Option<&Value>) -> CommandOutcome {
        self(params)
    }
}

/// Static hardware identity reported by the `chip-info` command.
#[derive(Debug, Clone, Serialize)]
pub struct ChipInfo {
    /// Board or product name.
    pub name: String,
    /// Chip model string.
    pub model: String,
    /// Silicon revision.
    pub revision: u32,
    /// CPU core count.
    pub cores: u32,
}
