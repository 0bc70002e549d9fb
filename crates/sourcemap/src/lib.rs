//! Source map decoding
//!
//! This crate turns an encoded (version 3) source map into a
//! [`DecodedSourceMap`] and answers position queries in both directions:
//! generated JavaScript to original source, and original source back to
//! generated JavaScript.
//!
//! All positions handled here are 1-based, matching the way editors present
//! lines and columns. Callers working with the debugger's 0-based wire
//! coordinates convert at the boundary.
//!
//! # Usage
//!
//! ```ignore
//! let map = sourcemap::locate::load_for_generated_file(Path::new("out/app.js"))?;
//! if let Some(map) = map {
//!     let original = map.original_position_for(Position::new(10, 4));
//! }
//! ```

mod decoder;
mod error;
pub mod locate;
mod query;
pub mod vlq;

pub use decoder::{DecodedSourceMap, Position, SourceFile, Span, SpanMapping};
pub use error::SourceMapError;
pub use query::{MappedPoint, MappedSpan};
