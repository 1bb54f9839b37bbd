//! Wire format constants and helpers.
//!
//! A frame on the wire is:
//! ```text
//! ┌─────┬────────┬─────┬──────────┬─────┬──────────┬─────┐
//! │ SOH │ header │ STX │ body     │ ETX │ crc hex  │ EOT │
//! │ 0x01│ ≤10 B  │ 0x02│ ≤30000 B │ 0x03│ ≤10 hex  │ 0x04│
//! └─────┴────────┴─────┴──────────┴─────┴──────────┴─────┘
//! ```
//!
//! Header and body bytes must be printable ASCII in `[0x20, 0x7E]`; the four
//! markers are the only control bytes the protocol admits. The checksum is
//! CRC-32 (ISO-HDLC, the zlib/Ethernet polynomial) over the body bytes only,
//! transmitted as lowercase hex with no leading-zero padding.

use bytes::{BufMut, Bytes, BytesMut};

/// Start of header.
pub const SOH: u8 = 0x01;
/// Start of body.
pub const STX: u8 = 0x02;
/// End of body.
pub const ETX: u8 = 0x03;
/// End of transmission.
pub const EOT: u8 = 0x04;

/// Maximum header length in bytes.
pub const MAX_HEADER_LEN: usize = 10;
/// Maximum body length in bytes.
pub const MAX_BODY_LEN: usize = 30_000;
/// Maximum checksum length in hex digits.
pub const MAX_CHECKSUM_DIGITS: usize = 10;

/// Check whether a byte is printable ASCII.
#[inline]
pub fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// CRC-32 over body bytes. The header never participates in the checksum.
pub fn body_crc32(body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    hasher.finalize()
}

/// Encode an outbound frame: `SOH header STX body ETX crc-hex EOT`.
///
/// The caller is responsible for keeping header and body within the
/// printable-ASCII envelope; the markers would otherwise corrupt framing on
/// the receiving end.
pub fn encode_frame(header: &str, body: &str) -> Bytes {
    let crc = format!("{:x}", body_crc32(body.as_bytes()));
    let mut buf = BytesMut::with_capacity(header.len() + body.len() + crc.len() + 4);
    buf.put_u8(SOH);
    buf.extend_from_slice(header.as_bytes());
    buf.put_u8(STX);
    buf.extend_from_slice(body.as_bytes());
    buf.put_u8(ETX);
    buf.extend_from_slice(crc.as_bytes());
    buf.put_u8(EOT);
    buf.freeze()
}
