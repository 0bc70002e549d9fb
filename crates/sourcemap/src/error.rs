//! Error types for source map decoding.

use std::io;

/// Errors raised while loading or decoding a source map.
///
/// The variants split into two families: [`SourceMapError::UnsupportedFormat`]
/// means "this is not a map we can use", while [`SourceMapError::Decoding`] and
/// [`SourceMapError::InvalidBase64`] mean the map claims to be valid but its
/// data is corrupt.
#[derive(Debug, thiserror::Error)]
pub enum SourceMapError {
    /// Missing required fields, or segments without an original position.
    #[error("unsupported source map format: {0}")]
    UnsupportedFormat(String),

    /// Out-of-range positions or indices, or a malformed VLQ segment.
    #[error("error decoding source map: {0}")]
    Decoding(String),

    /// A `mappings` character outside the base64 alphabet.
    #[error("invalid base64 digit {0:?} in mappings")]
    InvalidBase64(char),

    #[error("source map is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resolving source url: {0}")]
    Url(#[from] url::ParseError),

    #[error("reading source map: {0}")]
    Io(#[from] io::Error),
}

impl SourceMapError {
    /// Whether the error means the data was corrupt rather than unsupported.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            SourceMapError::Decoding(_) | SourceMapError::InvalidBase64(_) | SourceMapError::Json(_)
        )
    }
}
