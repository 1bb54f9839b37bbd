//! # fixlink
//!
//! Serial agent core for a remotely controlled test fixture.
//!
//! The host drives the fixture over a byte channel (normally a UART) using
//! control-byte delimited frames carrying JSON command bodies. This crate
//! implements the three pieces every fixture agent needs:
//!
//! - **Frame transport**: a byte-at-a-time decoder with checksum
//!   verification and fault recovery, plus the matching encoder
//! - **Command dispatch**: a thread-safe registry with built-in methods
//!   (`version`, `uptime`, `reboot`, `echo`, `chip-info`, `set-baud`) that
//!   collaborator subsystems extend with their own handlers
//! - **Liveness watchdog**: restarts the agent when the host goes silent
//!   for too long
//!
//! ## Example
//!
//! ```ignore
//! use fixlink::dispatch::{ChipInfo, CommandOutcome};
//! use fixlink::session::SessionBuilder;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> fixlink::Result<()> {
//!     let session = SessionBuilder::new(
//!         "1.4.0",
//!         ChipInfo {
//!             name: "fixture".into(),
//!             model: "esp32s3".into(),
//!             revision: 1,
//!             cores: 2,
//!         },
//!     )
//!     .command("pin-map", |_params| {
//!         CommandOutcome::result(json!({"pins": []}))
//!     })?
//!     .build();
//!
//!     session.run(fixlink::channel::open("/dev/ttyUSB0", 115_200)?).await
//! }
//! ```

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod rpc;
pub mod session;
pub mod watchdog;

pub use error::{FixlinkError, Result};
pub use protocol::{DecodeEvent, Decoder, Frame, FrameFault};
pub use session::{Session, SessionBuilder};
