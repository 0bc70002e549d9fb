//! Message reader.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::MessageCodec;
use crate::error::CodecError;
use crate::message::Message;

pin_project! {
    /// An async stream of incoming debugger messages.
    ///
    /// Wraps an [`AsyncRead`] source, accumulating partial reads until a
    /// whole frame is available and yielding back-to-back frames one by one.
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let mut reader = MessageReader::new(tcp_read_half);
    /// while let Some(message) = reader.next().await {
    ///     match message? {
    ///         Message::Response(r) => { /* complete a pending command */ }
    ///         Message::Event(e) => { /* break, exception, afterCompile */ }
    ///         _ => {}
    ///     }
    /// }
    /// ```
    pub struct MessageReader<R> {
        #[pin]
        inner: FramedRead<R, MessageCodec>,
    }
}

impl<R> MessageReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, MessageCodec::new())
    }

    /// Create a reader with a custom codec, e.g. to change the maximum
    /// message size.
    pub fn with_codec(reader: R, codec: MessageCodec) -> Self {
        Self {
            inner: FramedRead::new(reader, codec),
        }
    }
}

impl<R> Stream for MessageReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Message, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
