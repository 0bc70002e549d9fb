//! Error types for the transport layer.

use std::io;

/// Errors that can occur while framing debugger messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The header block contained invalid UTF-8.
    #[error("invalid UTF-8 in header")]
    InvalidUtf8,

    #[error("malformed Content-length header value")]
    MalformedContentLength,

    /// A header block ended without a `Content-length` line.
    #[error("missing Content-length header")]
    MissingContentLength,

    /// The message body exceeds the configured maximum size.
    #[error("message size {size} exceeds maximum allowed {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("JSON serialization failed: {0}")]
    JsonSerialize(#[source] serde_json::Error),
}
