//! `Content-length` framing codec.
//!
//! The debuggee prefixes every JSON document with a header block:
//!
//! ```text
//! Content-length: <N>\r\n
//! \r\n
//! <N bytes of JSON>
//! ```
//!
//! On connect the V8 agent also sends a handshake header block (`Type`,
//! `V8-Version`, `Protocol-Version`, `Embedding-Host`) with an empty body.
//! Unknown headers are ignored and empty bodies are skipped. Only framing
//! and I/O problems are decoder errors; a body that is not the JSON we
//! expect becomes [`Message::Malformed`].

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::message::{Malformed, Message, OutgoingMessage};

/// Default maximum message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Codec for encoding and decoding debugger protocol messages.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_message_size: usize,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Messages larger than `max_message_size` are rejected with
    /// [`CodecError::MessageTooLarge`].
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(header_end) = find_header_end(src) else {
                return Ok(None);
            };

            let content_length = parse_content_length(&src[..header_end])?;
            if content_length > self.max_message_size {
                return Err(CodecError::MessageTooLarge {
                    size: content_length,
                    max: self.max_message_size,
                });
            }

            let body_start = header_end + HEADER_TERMINATOR.len();
            let total_length = body_start + content_length;
            if src.len() < total_length {
                src.reserve(total_length - src.len());
                return Ok(None);
            }

            let frame = src.split_to(total_length);
            if content_length == 0 {
                tracing::trace!("skipping empty message body");
                continue;
            }

            let body = &frame[body_start..];
            tracing::trace!(body = %String::from_utf8_lossy(body), "received message");
            let message = match serde_json::from_slice(body) {
                Ok(value) => Message::from_value(value),
                Err(e) => Message::Malformed(Malformed {
                    request_seq: None,
                    error: e.to_string(),
                }),
            };
            if let Message::Malformed(malformed) = &message {
                tracing::warn!(error = %malformed.error, "received malformed message");
            }
            return Ok(Some(message));
        }
    }
}

impl Encoder<OutgoingMessage> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: OutgoingMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(CodecError::JsonSerialize)?;

        dst.reserve(32 + json.len());
        dst.put_slice(b"Content-length: ");
        dst.put_slice(json.len().to_string().as_bytes());
        dst.put_slice(HEADER_TERMINATOR);
        dst.put_slice(&json);

        Ok(())
    }
}

/// Returns the index of the first `\r` of the header terminator.
fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

fn parse_content_length(header: &[u8]) -> Result<usize, CodecError> {
    let header_str = std::str::from_utf8(header).map_err(|_| CodecError::InvalidUtf8)?;

    for line in header_str.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            return value
                .trim()
                .parse()
                .map_err(|_| CodecError::MalformedContentLength);
        }
    }

    Err(CodecError::MissingContentLength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Request;

    fn make_frame(json: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_slice(format!("Content-length: {}\r\n\r\n{}", json.len(), json).as_bytes());
        buf
    }

    #[test]
    fn decode_complete_message() {
        let mut codec = MessageCodec::new();
        let json = r#"{"seq":1,"type":"event","event":"break"}"#;
        let mut buf = make_frame(json);

        let result = codec.decode(&mut buf).unwrap();
        assert!(matches!(result, Some(Message::Event(e)) if e.event == "break"));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_skips_handshake() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(
            "Type: connect\r\nV8-Version: 5.1.281\r\nProtocol-Version: 1\r\nEmbedding-Host: node v6.11.0\r\nContent-Length: 0\r\n\r\n",
        );
        buf.put_slice(&make_frame(r#"{"type":"output","output":"hi"}"#));

        let result = codec.decode(&mut buf).unwrap();
        assert!(matches!(result, Some(Message::Output(o)) if o.output == "hi"));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_only_handshake_waits_for_more() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from("Type: connect\r\nContent-Length: 0\r\n\r\n");

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_header() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from("Content-length: 10");

        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert!(!buf.is_empty());
    }

    #[test]
    fn decode_across_partial_reads() {
        let mut codec = MessageCodec::new();
        let frame = make_frame(r#"{"seq":7,"type":"event","event":"afterCompile"}"#);
        let (first, rest) = frame.split_at(5);
        let (second, third) = rest.split_at(30);

        let mut buf = BytesMut::new();
        buf.put_slice(first);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_slice(second);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_slice(third);
        let message = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(message, Message::Event(e) if e.seq == 7));
    }

    #[test]
    fn decode_back_to_back_messages() {
        let mut codec = MessageCodec::new();
        let json1 = r#"{"seq":1,"type":"event","event":"break"}"#;
        let json2 = r#"{"seq":2,"type":"response","request_seq":1,"command":"continue","success":true,"running":true}"#;

        let mut buf = BytesMut::new();
        buf.put_slice(&make_frame(json1));
        buf.put_slice(&make_frame(json2));

        let msg1 = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(msg1, Message::Event(e) if e.seq == 1));

        let msg2 = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(msg2, Message::Response(r) if r.running && r.request_seq == Some(1)));

        assert!(buf.is_empty());
    }

    #[test]
    fn decode_message_too_large() {
        let mut codec = MessageCodec::with_max_size(10);
        let mut buf = BytesMut::from("Content-length: 100\r\n\r\n");

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::MessageTooLarge { .. })));
    }

    #[test]
    fn decode_missing_content_length() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from("Type: connect\r\n\r\n{}");

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::MissingContentLength)));
    }

    #[test]
    fn malformed_bodies_do_not_stop_decoding() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&make_frame(r#"{"type":"response","request_seq":99}"#));
        buf.put_slice(&make_frame("not json"));
        buf.put_slice(&make_frame(r#"{"seq":3,"type":"event","event":"break"}"#));

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(first, Message::Malformed(m) if m.request_seq == Some(99)));
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(second, Message::Malformed(m) if m.request_seq.is_none()));
        let third = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(third, Message::Event(e) if e.seq == 3));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_request() {
        let mut codec = MessageCodec::new();
        let msg = OutgoingMessage::Request(Request {
            seq: 1,
            command: "backtrace".to_string(),
            arguments: None,
        });

        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();

        let s = std::str::from_utf8(&buf).unwrap();
        let (header, body) = s.split_once("\r\n\r\n").unwrap();
        assert_eq!(header, format!("Content-length: {}", body.len()));
        assert_eq!(body, r#"{"type":"request","seq":1,"command":"backtrace"}"#);
    }
}
