//! Async transport for the legacy V8 debugger protocol.
//!
//! The debuggee exchanges JSON documents framed with a `Content-length`
//! header over a loopback TCP connection. This crate only deals with
//! framing and typed envelopes:
//!
//! - [`MessageCodec`] implements `Encoder` and `Decoder`
//! - [`MessageReader`] turns an `AsyncRead` into a `Stream` of [`Message`]s
//! - [`MessageWriter`] is a `Sink` of [`OutgoingMessage`]s
//!
//! Request correlation and event routing live in the `debugger` crate.

mod codec;
mod error;
mod message;
mod reader;
mod transport;
mod writer;

pub mod testing;

pub use codec::{DEFAULT_MAX_MESSAGE_SIZE, MessageCodec};
pub use error::CodecError;
pub use message::{
    Event, Execute, Malformed, Message, OutgoingMessage, Output, Request, Response, Seq,
};
pub use reader::MessageReader;
pub use transport::{Transport, split, split_with_codec};
pub use writer::MessageWriter;

use std::io;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Connect to an already-listening debuggee.
pub async fn connect(
    addr: impl ToSocketAddrs,
) -> io::Result<(
    MessageReader<tokio::net::tcp::OwnedReadHalf>,
    MessageWriter<tokio::net::tcp::OwnedWriteHalf>,
)> {
    let stream = TcpStream::connect(addr).await?;
    Ok(split(stream))
}

/// Ask the OS for a currently unused loopback port.
pub fn get_random_tcp_port() -> io::Result<u16> {
    let mut last_error = None;
    for _ in 0..50 {
        match std::net::TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => return Ok(listener.local_addr()?.port()),
            Err(e) => {
                tracing::warn!(%e, "binding");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| io::Error::other("could not get free port")))
}
