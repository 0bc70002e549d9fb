//! Helpers for testing code built on the transport.

mod memory;

pub use memory::MemoryTransport;

use serde::Serialize;

/// Frame a JSON-serializable message the way the debuggee does.
///
/// ```
/// use transport::testing::frame_message;
/// use serde_json::json;
///
/// let bytes = frame_message(&json!({"seq": 1, "type": "event", "event": "break"}));
/// assert!(bytes.starts_with(b"Content-length: "));
/// ```
pub fn frame_message(msg: &impl Serialize) -> Vec<u8> {
    let json = serde_json::to_string(msg).expect("failed to serialize message");
    format!("Content-length: {}\r\n\r\n{}", json.len(), json).into_bytes()
}

/// Several frames concatenated together, as if delivered in one read.
pub fn frame_messages<T: Serialize>(msgs: &[T]) -> Vec<u8> {
    msgs.iter().flat_map(|m| frame_message(m)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_messages() {
        let bytes = frame_messages(&[
            json!({"seq": 1, "type": "event", "event": "a"}),
            json!({"seq": 2, "type": "event", "event": "b"}),
        ]);
        let s = String::from_utf8(bytes).unwrap();

        assert_eq!(s.matches("Content-length:").count(), 2);
    }
}
