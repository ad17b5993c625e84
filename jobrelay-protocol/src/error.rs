//! Errors shared by both sides of the wire protocol.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol bytes, or while
/// driving the configure handshake.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer echoed back something other than the exact bytes sent.
    #[error("echo mismatch: sent {sent:?}, got back {got:?}")]
    EchoMismatch { sent: Vec<u8>, got: Vec<u8> },

    /// A result record would exceed [`crate::MAX_RECORD_BYTES`] even after
    /// truncating `output`, or was received already over that bound.
    #[error("result record exceeds {max} bytes")]
    RecordTooLong { max: usize },

    /// The bytes on the wire were not valid UTF-8.
    #[error("invalid UTF-8 on the wire")]
    InvalidUtf8(#[from] core::str::Utf8Error),

    /// Underlying I/O failure (connect, read, write).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The connection closed before a complete message arrived.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,
}
