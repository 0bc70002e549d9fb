//! In-memory transport.

use tokio::io::{DuplexStream, duplex};

use crate::transport::Transport;

/// One end of a connected in-memory byte channel.
///
/// ```
/// use transport::testing::MemoryTransport;
/// use transport::split;
///
/// let (client, debuggee) = MemoryTransport::pair();
/// let (client_reader, client_writer) = split(client);
/// let (debuggee_reader, debuggee_writer) = split(debuggee);
/// ```
pub struct MemoryTransport {
    read: DuplexStream,
    write: DuplexStream,
}

impl MemoryTransport {
    /// Create a connected pair with 64KB buffers in each direction.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_buffer_size(64 * 1024)
    }

    pub fn pair_with_buffer_size(buffer_size: usize) -> (Self, Self) {
        let (a_to_b_write, a_to_b_read) = duplex(buffer_size);
        let (b_to_a_write, b_to_a_read) = duplex(buffer_size);

        (
            MemoryTransport {
                read: b_to_a_read,
                write: a_to_b_write,
            },
            MemoryTransport {
                read: a_to_b_read,
                write: b_to_a_write,
            },
        )
    }
}

impl Transport for MemoryTransport {
    type Read = DuplexStream;
    type Write = DuplexStream;

    fn into_split(self) -> (Self::Read, Self::Write) {
        (self.read, self.write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, OutgoingMessage, Request, Response};
    use crate::split;
    use futures::StreamExt;

    #[tokio::test]
    async fn request_and_response() {
        let (client, debuggee) = MemoryTransport::pair();
        let (mut client_reader, mut client_writer) = split(client);
        let (mut debuggee_reader, mut debuggee_writer) = split(debuggee);

        client_writer
            .send(OutgoingMessage::Request(Request {
                seq: 1,
                command: "scripts".to_string(),
                arguments: None,
            }))
            .await
            .unwrap();

        let msg = debuggee_reader.next().await.unwrap().unwrap();
        let Message::Request(request) = msg else {
            panic!("expected request");
        };
        assert_eq!(request.command, "scripts");

        debuggee_writer
            .send(OutgoingMessage::Response(Response {
                seq: 1,
                request_seq: Some(request.seq),
                command: Some(request.command),
                success: true,
                ..Default::default()
            }))
            .await
            .unwrap();

        let msg = client_reader.next().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Response(r) if r.correlation_seq() == 1 && r.success));
    }

    #[tokio::test]
    async fn close_signals_eof() {
        let (client, debuggee) = MemoryTransport::pair();
        let (_client_reader, client_writer) = split(client);
        let (mut debuggee_reader, _debuggee_writer) = split(debuggee);

        drop(client_writer);
        assert!(debuggee_reader.next().await.is_none());
    }
}
