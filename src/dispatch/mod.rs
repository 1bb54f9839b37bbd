//! Command dispatch.
//!
//! [`CommandRegistry`] resolves incoming method names, executing built-ins
//! itself and delegating the rest to handlers registered by collaborator
//! subsystems. A handler returns a [`CommandOutcome`]: an optional result
//! payload, an optional error, and an [`ActionDirective`] for side effects
//! the session applies after replying.

mod command;
mod registry;

pub use command::{ActionDirective, ChipInfo, Command, CommandOutcome};
pub use registry::CommandRegistry;
