//! Session builder and runtime loop.
//!
//! The [`SessionBuilder`] wires together the command registry, watchdog,
//! and channel settings; [`Session::run`] then owns the channel for the
//! life of the agent:
//! 1. Arm the watchdog
//! 2. Read raw bytes with a bounded timeout
//! 3. Feed the decoder, answer each event
//! 4. Apply deferred directives (baud switch, reboot)
//!
//! # Example
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
//!     let port = fixlink::channel::open("/dev/ttyUSB0", 115_200)?;
//!     session.run(port).await
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::channel::LineControl;
use crate::dispatch::{ActionDirective, ChipInfo, Command, CommandRegistry};
use crate::error::Result;
use crate::protocol::{encode_frame, DecodeEvent, Decoder, Frame};
use crate::rpc;
use crate::watchdog::{ProcessRestarter, Restarter, Watchdog, WatchdogConfig};

/// Header of an incoming command frame.
pub const CMD_HEADER: &str = "CMD";
/// Header of an outgoing reply frame.
pub const RESP_HEADER: &str = "RESP";
/// Header of an outgoing transport-fault frame.
pub const ERR_HEADER: &str = "ERR";

/// Read buffer size for the channel.
const RX_BUF_SIZE: usize = 2048;

/// Default bound on a single channel read.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Builder for configuring and creating a session.
pub struct SessionBuilder {
    registry: CommandRegistry,
    watchdog_config: WatchdogConfig,
    read_timeout: Duration,
    restarter: Arc<dyn Restarter>,
}

impl SessionBuilder {
    /// Create a builder with the identity the built-in commands report.
    pub fn new(firmware_version: impl Into<String>, chip_info: ChipInfo) -> Self {
        Self {
            registry: CommandRegistry::new(firmware_version, chip_info),
            watchdog_config: WatchdogConfig::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            restarter: Arc::new(ProcessRestarter),
        }
    }

    /// Register a command handler.
    pub fn command(self, method: &str, handler: impl Command + 'static) -> Result<Self> {
        self.registry.register(method, handler)?;
        Ok(self)
    }

    /// Register a table of command handlers.
    pub fn commands<I>(self, table: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Arc<dyn Command>)>,
    {
        self.registry.register_table(table)?;
        Ok(self)
    }

    /// Override the watchdog timing. Default: 30 minute interval checked
    /// once per second.
    pub fn watchdog(mut self, config: WatchdogConfig) -> Self {
        self.watchdog_config = config;
        self
    }

    /// Override the per-read timeout. Default: 100 ms.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Override how the agent restarts itself. Default: exit the process
    /// and let the supervisor relaunch it.
    pub fn restarter(mut self, restarter: Arc<dyn Restarter>) -> Self {
        self.restarter = restarter;
        self
    }

    /// Finalize into a session.
    pub fn build(self) -> Session {
        Session {
            registry: Arc::new(self.registry),
            watchdog_config: self.watchdog_config,
            read_timeout: self.read_timeout,
            restarter: self.restarter,
        }
    }
}

/// A configured agent session, ready to take ownership of a channel.
pub struct Session {
    registry: Arc<CommandRegistry>,
    watchdog_config: WatchdogConfig,
    read_timeout: Duration,
    restarter: Arc<dyn Restarter>,
}

impl Session {
    /// The command registry, for collaborators that register after build.
    pub fn registry(&self) -> Arc<CommandRegistry> {
        Arc::clone(&self.registry)
    }

    /// Drive the session over `channel` until the peer closes it.
    ///
    /// Returns `Ok(())` on a clean EOF, which only an in-memory channel
    /// produces; a real UART read blocks forever instead.
    pub async fn run<C>(self, mut channel: C) -> Result<()>
    where
        C: AsyncRead + AsyncWrite + LineControl + Unpin + Send,
    {
        let watchdog = Watchdog::spawn(self.watchdog_config, Arc::clone(&self.restarter));
        let epoch = Instant::now();
        let mut decoder = Decoder::new();
        let mut buf = vec![0u8; RX_BUF_SIZE];
        let mut reboot_at_ms: Option<u64> = None;

        loop {
            let now_ms = epoch.elapsed().as_millis() as u64;
            if let Some(deadline) = reboot_at_ms {
                if now_ms >= deadline {
                    // The reply left the queue earlier; make sure it left
                    // the transmitter too.
                    channel.flush().await?;
                    debug!("reboot deadline reached");
                    self.restarter.restart();
                    return Ok(());
                }
            }

            let n = match timeout(self.read_timeout, channel.read(&mut buf)).await {
                Ok(Ok(0)) => return Ok(()),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e.into()),
                // Nothing arrived inside the bound; loop so the reboot
                // deadline stays live even on a silent line.
                Err(_) => continue,
            };

            for event in decoder.feed(&buf[..n]) {
                match event {
                    DecodeEvent::Fault(fault) => {
                        warn!(fault = ?fault, "frame fault");
                        send_frame(&mut channel, ERR_HEADER, fault.wire_message()).await?;
                    }
                    DecodeEvent::Frame(frame) => {
                        // Any checksum-valid frame proves the link is alive.
                        watchdog.reset();
                        let now_ms = epoch.elapsed().as_millis() as u64;
                        if frame.header == CMD_HEADER {
                            let (body, action) = self.execute(&frame, now_ms);
                            send_frame(&mut channel, RESP_HEADER, &body).await?;
                            self.apply(&mut channel, action, &mut reboot_at_ms).await?;
                        } else {
                            warn!(header = %frame.header, "unrecognized frame header");
                            send_frame(&mut channel, ERR_HEADER, "Header not recognized").await?;
                        }
                    }
                }
            }
        }
    }

    /// Parse and dispatch one command body, producing the reply body and
    /// any deferred side effect.
    fn execute(&self, frame: &Frame, now_ms: u64) -> (String, ActionDirective) {
        let request = match rpc::parse_request(&frame.body) {
            Ok(request) => request,
            Err(error) => return (rpc::error_body(&error), ActionDirective::default()),
        };

        let outcome = self
            .registry
            .dispatch(&request.method, request.params.as_ref(), now_ms);

        match outcome.error {
            Some(error) => (rpc::error_body(&error), ActionDirective::default()),
            None => (rpc::success_body(outcome.result), outcome.action),
        }
    }

    async fn apply<C>(
        &self,
        channel: &mut C,
        action: ActionDirective,
        reboot_at_ms: &mut Option<u64>,
    ) -> Result<()>
    where
        C: AsyncWrite + LineControl + Unpin,
    {
        if let Some(baud) = action.new_baud {
            // Drain before switching, or the reply garbles mid-flight.
            channel.flush().await?;
            channel.set_line_rate(baud)?;
            debug!(baud, "line rate switched");
        }
        if let Some(at) = action.reboot_at_ms {
            *reboot_at_ms = Some(at);
        }
        Ok(())
    }
}

/// Write one frame as a single contiguous write followed by a flush.
async fn send_frame<W>(channel: &mut W, header: &str, body: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(header, body);
    channel.write_all(&bytes).await?;
    channel.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CommandOutcome;
    use serde_json::Value;

    fn chip() -> ChipInfo {
        ChipInfo {
            name: "bench".into(),
            model: "esp32s3".into(),
            revision: 0,
            cores: 2,
        }
    }

    #[test]
    fn test_builder_rejects_duplicate_command() {
        let result = SessionBuilder::new("1.0.0", chip())
            .command("scan", |_: Option<&Value>| CommandOutcome::ok())
            .unwrap()
            .command("scan", |_: Option<&Value>| CommandOutcome::ok());
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_shared_after_build() {
        let session = SessionBuilder::new("1.0.0", chip()).build();
        let registry = session.registry();
        registry
            .register("late", |_: Option<&Value>| CommandOutcome::ok())
            .unwrap();
        assert!(registry.dispatch("late", None, 0).error.is_none());
    }

    #[test]
    fn test_execute_maps_parse_failure() {
        let session = SessionBuilder::new("1.0.0", chip()).build();
        let frame = Frame::new(CMD_HEADER, "{broken");
        let (body, action) = session.execute(&frame, 0);
        assert!(body.contains("-32700"));
        assert!(action.is_empty());
    }

    #[test]
    fn test_execute_success_and_directive() {
        let session = SessionBuilder::new("1.0.0", chip()).build();
        let frame = Frame::new(CMD_HEADER, r#"{"method":"reboot"}"#);
        let (body, action) = session.execute(&frame, 1_000);
        assert_eq!(body, r#"{"result":0}"#);
        assert_eq!(action.reboot_at_ms, Some(1_500));
    }
}
