//! Error types for encoding, decoding and framing protocol messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame decoded as JSON but not as a known event, or a required
    /// field was missing or had the wrong shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: u32 },

    #[error("framing I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::MalformedPayload(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
