//! Completed frame type.

use bytes::Bytes;

use super::wire;

/// A complete frame: header plus body, both printable ASCII.
///
/// Inbound frames are produced by the decoder once their checksum has been
/// verified; they are consumed exactly once by the session and discarded.
/// Outbound frames are built with [`Frame::new`] and serialized with
/// [`Frame::encode`], which computes the checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame type identifier (`CMD`, `RESP`, `ERR`, ...).
    pub header: String,
    /// Payload text, usually a JSON object.
    pub body: String,
}

impl Frame {
    /// Create a new outbound frame.
    pub fn new(header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            body: body.into(),
        }
    }

    /// Serialize to wire bytes, checksum included.
    pub fn encode(&self) -> Bytes {
        wire::encode_frame(&self.header, &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::{EOT, SOH};

    #[test]
    fn test_frame_encode_is_delimited() {
        let frame = Frame::new("RESP", r#"{"result":0}"#);
        let bytes = frame.encode();
        assert_eq!(bytes[0], SOH);
        assert_eq!(bytes[bytes.len() - 1], EOT);
    }

    #[test]
    fn test_frame_equality() {
        assert_eq!(Frame::new("CMD", "x"), Frame::new("CMD", "x"));
        assert_ne!(Frame::new("CMD", "x"), Frame::new("ERR", "x"));
    }
}
