//! Byte channels the session can run over.
//!
//! The session is generic over any `AsyncRead + AsyncWrite` stream that also
//! implements [`LineControl`], so the same loop drives a real UART and an
//! in-memory duplex pipe in tests.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::Result;

/// Line-rate control for the underlying channel.
pub trait LineControl {
    /// Reconfigure the channel to a new baud rate.
    ///
    /// The session drains pending output before calling this, so the switch
    /// never clips the frame that requested it.
    fn set_line_rate(&mut self, baud: u32) -> Result<()>;
}

#[cfg(feature = "serial")]
mod serial {
    use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

    use super::LineControl;
    use crate::error::{FixlinkError, Result};

    impl LineControl for SerialStream {
        fn set_line_rate(&mut self, baud: u32) -> Result<()> {
            self.set_baud_rate(baud)
                .map_err(|e| FixlinkError::Serial(e.to_string()))
        }
    }

    /// Open a serial port for the session.
    pub fn open(path: &str, baud: u32) -> Result<SerialStream> {
        tokio_serial::new(path, baud)
            .open_native_async()
            .map_err(|e| FixlinkError::Serial(e.to_string()))
    }
}

#[cfg(feature = "serial")]
pub use serial::open;

/// Wraps any in-memory stream with a [`LineControl`] that records the
/// requested rates. Used by the test suite and by demos that run the
/// session without hardware.
pub struct LoopbackControl<S> {
    inner: S,
    rates: Arc<Mutex<Vec<u32>>>,
}

impl<S> LoopbackControl<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            rates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of every rate requested so far, in order.
    pub fn rates(&self) -> Arc<Mutex<Vec<u32>>> {
        Arc::clone(&self.rates)
    }
}

impl<S> LineControl for LoopbackControl<S> {
    fn set_line_rate(&mut self, baud: u32) -> Result<()> {
        match self.rates.lock() {
            Ok(mut rates) => rates.push(baud),
            Err(poisoned) => poisoned.into_inner().push(baud),
        }
        Ok(())
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for LoopbackControl<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for LoopbackControl<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
