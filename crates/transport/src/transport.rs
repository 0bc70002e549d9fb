//! Transport abstraction.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::codec::MessageCodec;
use crate::reader::MessageReader;
use crate::writer::MessageWriter;

/// A byte stream that can be split into independent read and write halves.
pub trait Transport: Send + 'static {
    type Read: AsyncRead + Unpin + Send + 'static;
    type Write: AsyncWrite + Unpin + Send + 'static;

    fn into_split(self) -> (Self::Read, Self::Write);
}

impl Transport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (Self::Read, Self::Write) {
        TcpStream::into_split(self)
    }
}

/// Split a transport into a message reader and writer pair.
pub fn split<T: Transport>(transport: T) -> (MessageReader<T::Read>, MessageWriter<T::Write>) {
    split_with_codec(transport, MessageCodec::new())
}

/// Like [`split`], decoding with `codec`.
pub fn split_with_codec<T: Transport>(
    transport: T,
    codec: MessageCodec,
) -> (MessageReader<T::Read>, MessageWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (MessageReader::with_codec(read, codec), MessageWriter::new(write))
}
