//! Framed wire protocol.
//!
//! Messages travel inside control-byte delimited frames:
//!
//! ```text
//! SOH header STX body ETX crc-hex EOT
//! ```
//!
//! [`wire`] holds the constants and the encoder, [`Frame`] is a completed
//! message, and [`Decoder`] reassembles frames from the raw byte stream.

mod decoder;
mod frame;
pub(crate) mod wire;

pub use decoder::{DecodeEvent, Decoder, FrameFault};
pub use frame::Frame;
pub use wire::{
    body_crc32, encode_frame, is_printable, EOT, ETX, MAX_BODY_LEN, MAX_CHECKSUM_DIGITS,
    MAX_HEADER_LEN, SOH, STX,
};
