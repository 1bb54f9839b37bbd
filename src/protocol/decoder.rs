//! Byte-stream state machine that reassembles frames from a noisy channel.
//!
//! The decoder consumes raw serial bytes one at a time and emits completed,
//! checksum-verified [`Frame`]s along with [`FrameFault`]s for protocol
//! violations. It never fails outright: a fault enters a local recovery
//! state that discards bytes until the next `SOH` or `EOT` resynchronizes
//! the stream.
//!
//! # Example
//!
//! ```
//! use fixlink::protocol::{DecodeEvent, Decoder, Frame};
//!
//! let mut decoder = Decoder::new();
//! let wire = Frame::new("CMD", r#"{"method":"version"}"#).encode();
//!
//! let events = decoder.feed(&wire);
//! assert_eq!(events.len(), 1);
//! assert!(matches!(&events[0], DecodeEvent::Frame(f) if f.header == "CMD"));
//! ```

use super::frame::Frame;
use super::wire::{
    body_crc32, is_printable, EOT, ETX, MAX_BODY_LEN, MAX_CHECKSUM_DIGITS, MAX_HEADER_LEN, SOH,
    STX,
};

/// Receive states; exactly one is active per decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecvState {
    /// Waiting for `SOH`.
    Idle,
    /// Accumulating header bytes until `STX`.
    Header,
    /// Accumulating body bytes until `ETX`.
    Body,
    /// Accumulating checksum hex digits until `EOT`.
    Checksum,
    /// A fault occurred; discard until `SOH` or `EOT`.
    ErrorRecovery,
}

/// Transport-level fault, reported to the peer as an `ERR` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFault {
    /// Non-printable byte while receiving the header.
    HeaderChar,
    /// Header exceeded [`MAX_HEADER_LEN`].
    HeaderOverflow,
    /// Non-printable byte while receiving the body.
    BodyChar,
    /// Body exceeded [`MAX_BODY_LEN`].
    BodyOverflow,
    /// Non-hex byte while receiving the checksum.
    ChecksumChar,
    /// Checksum exceeded [`MAX_CHECKSUM_DIGITS`].
    ChecksumOverflow,
    /// Received checksum did not match the computed body CRC.
    ChecksumMismatch,
}

impl FrameFault {
    /// The diagnostic string sent over the wire.
    ///
    /// These literals are part of the wire contract and must not change;
    /// host-side tooling matches on them.
    pub fn wire_message(self) -> &'static str {
        match self {
            FrameFault::HeaderChar => "HDR-CHR: Illegal character in header",
            FrameFault::HeaderOverflow => "HDR-OVR: Header too large",
            FrameFault::BodyChar => "BOD-CHR: Illegal character in body",
            FrameFault::BodyOverflow => "MSG-OVR: Message body too large",
            FrameFault::ChecksumChar => "CRC-CHR: Illegal character in CRC",
            FrameFault::ChecksumOverflow => "CRC-OVR: CRC too large",
            FrameFault::ChecksumMismatch => "CRC-FAIL: CRC check failed",
        }
    }
}

/// One output of [`Decoder::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A complete, checksum-valid frame.
    Frame(Frame),
    /// A protocol violation; the decoder has already entered recovery.
    Fault(FrameFault),
}

/// Incremental frame decoder.
///
/// Holds at most one partially received frame; completed frames are moved
/// out through [`DecodeEvent::Frame`] and the accumulation buffers reset.
pub struct Decoder {
    state: RecvState,
    header: String,
    body: String,
    crc_digits: String,
    computed_crc: u32,
}

impl Decoder {
    /// Create a decoder in the idle state.
    pub fn new() -> Self {
        Self {
            state: RecvState::Idle,
            header: String::with_capacity(MAX_HEADER_LEN),
            body: String::new(),
            crc_digits: String::with_capacity(MAX_CHECKSUM_DIGITS),
            computed_crc: 0,
        }
    }

    /// Consume a chunk of raw bytes, returning every completed frame and
    /// fault in order of occurrence.
    ///
    /// Bytes may arrive in any fragmentation, down to one at a time; partial
    /// frame state is kept across calls.
    pub fn feed(&mut self, data: &[u8]) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        for &byte in data {
            if let Some(event) = self.step(byte) {
                events.push(event);
            }
        }
        events
    }

    /// Advance the state machine by one input byte.
    fn step(&mut self, byte: u8) -> Option<DecodeEvent> {
        match self.state {
            RecvState::Idle => {
                if byte == SOH {
                    self.header.clear();
                    self.state = RecvState::Header;
                }
                // Everything else is line noise between frames.
                None
            }
            RecvState::Header => self.step_header(byte),
            RecvState::Body => self.step_body(byte),
            RecvState::Checksum => self.step_checksum(byte),
            RecvState::ErrorRecovery => {
                match byte {
                    SOH => {
                        self.header.clear();
                        self.state = RecvState::Header;
                    }
                    EOT => self.state = RecvState::Idle,
                    _ => {}
                }
                None
            }
        }
    }

    fn step_header(&mut self, byte: u8) -> Option<DecodeEvent> {
        match byte {
            STX => {
                // Header complete, start the body.
                self.body.clear();
                self.state = RecvState::Body;
                None
            }
            SOH => {
                // Restart the header.
                self.header.clear();
                None
            }
            EOT => {
                // Early termination; discard the message.
                self.state = RecvState::Idle;
                None
            }
            b if !is_printable(b) => self.fault(FrameFault::HeaderChar),
            b if self.header.len() < MAX_HEADER_LEN => {
                self.header.push(b as char);
                None
            }
            _ => self.fault(FrameFault::HeaderOverflow),
        }
    }

    fn step_body(&mut self, byte: u8) -> Option<DecodeEvent> {
        match byte {
            ETX => {
                // Body complete; checksum it now, then collect the peer's.
                self.computed_crc = body_crc32(self.body.as_bytes());
                self.crc_digits.clear();
                self.state = RecvState::Checksum;
                None
            }
            STX => {
                // Restart the body.
                self.body.clear();
                None
            }
            EOT => {
                self.state = RecvState::Idle;
                None
            }
            b if !is_printable(b) => self.fault(FrameFault::BodyChar),
            b if self.body.len() < MAX_BODY_LEN => {
                self.body.push(b as char);
                None
            }
            _ => self.fault(FrameFault::BodyOverflow),
        }
    }

    fn step_checksum(&mut self, byte: u8) -> Option<DecodeEvent> {
        if byte == EOT {
            // A mismatch only discards this message; it is not a framing
            // fault, so the decoder goes straight back to idle.
            self.state = RecvState::Idle;
            return if parse_crc(&self.crc_digits) == Some(self.computed_crc) {
                Some(DecodeEvent::Frame(Frame {
                    header: std::mem::take(&mut self.header),
                    body: std::mem::take(&mut self.body),
                }))
            } else {
                Some(DecodeEvent::Fault(FrameFault::ChecksumMismatch))
            };
        }

        // Comparison is case-insensitive even though the fixture always
        // transmits lowercase.
        let digit = byte.to_ascii_lowercase();
        if !digit.is_ascii_hexdigit() {
            self.fault(FrameFault::ChecksumChar)
        } else if self.crc_digits.len() < MAX_CHECKSUM_DIGITS {
            self.crc_digits.push(digit as char);
            None
        } else {
            self.fault(FrameFault::ChecksumOverflow)
        }
    }

    fn fault(&mut self, fault: FrameFault) -> Option<DecodeEvent> {
        self.state = RecvState::ErrorRecovery;
        Some(DecodeEvent::Fault(fault))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse received checksum digits. An empty checksum reads as zero, which
/// matches a checksum over an empty body; digits that overflow 32 bits can
/// never match and fall out as a mismatch.
fn parse_crc(digits: &str) -> Option<u32> {
    if digits.is_empty() {
        return Some(0);
    }
    u32::from_str_radix(digits, 16).ok()
}
