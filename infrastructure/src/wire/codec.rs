//! Incremental framing of the server's JSON stream.
//!
//! The server writes top-level JSON values back to back, with or without
//! whitespace between them, and a socket read may end anywhere inside a
//! value. [`FrameDecoder`] is a [`tokio_util::codec::Decoder`] that yields one
//! classified [`Message`] per complete value and leaves any trailing partial
//! value in the buffer for the next read.

use super::error::ConnectionError;
use bytes::{Buf, BytesMut};
use harness_domain::{Message, ProtocolError, classify};
use serde_json::Value;
use tokio_util::codec::Decoder;
use tracing::trace;

/// Decoder for a stream of concatenated JSON values.
///
/// Between calls it keeps the count of bytes consumed so far, used to
/// report stream offsets in errors, and how far it has scanned into an
/// unfinished array or object. The unparsed suffix itself lives in the
/// caller's buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    consumed: usize,
    scan: Scan,
    parses: usize,
}

/// Bracket scan over the value at the front of the buffer.
///
/// Only bytes that arrived since the last call are scanned, so a value
/// split across many reads costs linear work to frame.
#[derive(Debug, Default)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// Buffer length at the last parse that ran out of input.
    checked: usize,
}

impl Scan {
    /// Scan `bytes[self.pos..]` and return the end of the value once its
    /// outermost bracket closes.
    fn close(&mut self, bytes: &[u8]) -> Option<usize> {
        for (i, &b) in bytes.iter().enumerate().skip(self.pos) {
            if self.in_string {
                match b {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'[' | b'{' => self.depth += 1,
                b']' | b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        self.pos = bytes.len();
        None
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes consumed from the stream so far, whitespace included.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Take the next complete JSON value off the front of `buf`.
    ///
    /// `Ok(None)` means the buffer holds only whitespace or a value that is
    /// not finished yet. An array or object is parsed once its brackets
    /// balance; before that it is only parsed each time the buffer has
    /// doubled, which still surfaces syntax errors in a value that never
    /// completes.
    pub fn decode_value(&mut self, buf: &mut BytesMut) -> Result<Option<Value>, ProtocolError> {
        let leading = buf
            .iter()
            .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
            .count();
        self.advance(buf, leading);
        if buf.is_empty() {
            return Ok(None);
        }

        if !matches!(buf[0], b'[' | b'{') {
            return self.parse_prefix(buf);
        }
        match self.scan.close(buf) {
            Some(end) => {
                self.parses += 1;
                self.scan = Scan::default();
                match serde_json::from_slice::<Value>(&buf[..end]) {
                    Ok(value) => {
                        self.advance(buf, end);
                        trace!("Decoded {} byte value", end);
                        Ok(Some(value))
                    }
                    Err(e) => Err(self.malformed(buf, e.to_string())),
                }
            }
            None if buf.len() >= 2 * self.scan.checked => self.parse_prefix(buf),
            None => Ok(None),
        }
    }

    /// Parse the first value of `buf` with the stream deserializer,
    /// treating running out of input as "not finished yet".
    fn parse_prefix(&mut self, buf: &mut BytesMut) -> Result<Option<Value>, ProtocolError> {
        self.parses += 1;
        let (next, end) = {
            let mut stream = serde_json::Deserializer::from_slice(&buf[..]).into_iter::<Value>();
            let next = stream.next();
            (next, stream.byte_offset())
        };
        match next {
            Some(Ok(value)) => {
                self.scan = Scan::default();
                self.advance(buf, end);
                trace!("Decoded {} byte value", end);
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => {
                self.scan.checked = buf.len();
                Ok(None)
            }
            Some(Err(e)) => {
                self.scan = Scan::default();
                Err(self.malformed(buf, e.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Decode every complete value currently in `buf`, in stream order.
    pub fn decode_all(&mut self, buf: &mut BytesMut) -> Result<Vec<Message>, ConnectionError> {
        let mut messages = Vec::new();
        while let Some(message) = self.decode(buf)? {
            messages.push(message);
        }
        Ok(messages)
    }

    fn advance(&mut self, buf: &mut BytesMut, count: usize) {
        buf.advance(count);
        self.consumed += count;
    }

    fn malformed(&self, buf: &BytesMut, reason: String) -> ProtocolError {
        ProtocolError::MalformedMessage {
            offset: self.consumed,
            reason,
            remainder: String::from_utf8_lossy(buf).into_owned(),
        }
    }
}

impl Decoder for FrameDecoder {
    type Item = Message;
    type Error = ConnectionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ConnectionError> {
        match self.decode_value(src)? {
            Some(value) => Ok(Some(classify(value)?)),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ConnectionError> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(self
                .malformed(src, "stream ended in the middle of a value".to_string())
                .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_domain::{Notification, Response};
    use serde_json::json;

    fn decode_bytes(bytes: &[u8]) -> Result<Vec<Message>, ConnectionError> {
        let mut buf = BytesMut::from(bytes);
        FrameDecoder::new().decode_all(&mut buf)
    }

    #[test]
    fn test_decode_notification_and_response_with_whitespace() {
        let messages = decode_bytes(br#"["call","f",[1]]  [2,{"status":"OK"}]"#).unwrap();
        assert_eq!(
            messages,
            vec![
                Message::Notification(Notification::new("f", vec![json!(1)])),
                Message::Response(Response::new(2, json!({"status": "OK"}))),
            ]
        );
    }

    #[test]
    fn test_decode_concatenated_without_separators() {
        let messages = decode_bytes(br#"[1,{"a":1}][2,{"b":2}]["call","g",[]]"#).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].as_response().unwrap().request_number, 2);
        assert_eq!(messages[2].as_notification().unwrap().function, "g");
    }

    #[test]
    fn test_values_separated_by_mixed_whitespace() {
        let values = [
            r#"[1,{"status":"OK"}]"#,
            r#"["call","padre#debugger#Log",[4,"x"]]"#,
            r#"[2,"done"]"#,
            r#"["call","padre#debugger#JumpToPosition",["/tmp/a.c",2]]"#,
        ];
        for separator in ["", " ", "\n", "\r\n\t  "] {
            let stream = values.join(separator);
            let messages = decode_bytes(stream.as_bytes()).unwrap();
            assert_eq!(messages.len(), values.len(), "separator {separator:?}");
            assert_eq!(messages[3].as_notification().unwrap().args[1], json!(2));
        }
    }

    #[test]
    fn test_split_value_is_retained_until_complete() {
        let whole = br#"[1,{"status":"OK","pid":"1234"}]"#;
        let expected = decode_bytes(whole).unwrap();

        for split in 1..whole.len() {
            let mut decoder = FrameDecoder::new();
            let mut buf = BytesMut::from(&whole[..split]);
            let first = decoder.decode_all(&mut buf).unwrap();
            assert!(first.is_empty(), "split at {split} decoded early");

            buf.extend_from_slice(&whole[split..]);
            let second = decoder.decode_all(&mut buf).unwrap();
            assert_eq!(second, expected, "split at {split}");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_trailing_partial_value_is_left_in_buffer() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&br#"[1,"a"] ["call","f",[1"#[..]);
        let messages = decoder.decode_all(&mut buf).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(&buf[..], br#"["call","f",[1"#);
        assert_eq!(decoder.consumed(), 8);
    }

    #[test]
    fn test_whitespace_only_is_not_a_value() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&b"  \n\t "[..]);
        assert!(decoder.decode_all(&mut buf).unwrap().is_empty());
        assert!(buf.is_empty());
        assert!(decode_bytes(b"").unwrap().is_empty());
    }

    #[test]
    fn test_large_value_in_small_reads() {
        let data = "ab]\"}{[\\".repeat(8000);
        let bytes = serde_json::to_vec(&json!([1, {"data": data}])).unwrap();
        assert!(bytes.len() > 64 * 1024);

        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        let mut messages = Vec::new();
        for chunk in bytes.chunks(64) {
            buf.extend_from_slice(chunk);
            messages.extend(decoder.decode_all(&mut buf).unwrap());
        }

        assert_eq!(
            messages,
            vec![Message::Response(Response::new(1, json!({"data": data})))]
        );
        assert!(buf.is_empty());
        assert_eq!(decoder.consumed(), bytes.len());
        // One parse per doubling of the buffer, plus the final one
        assert!(decoder.parses <= 16, "{} parses", decoder.parses);
    }

    #[test]
    fn test_syntax_error_in_unfinished_value() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&br#"[1,{"a":}"#[..]);
        let err = decoder.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Protocol(ProtocolError::MalformedMessage { offset: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_syntax_reports_offset_and_remainder() {
        let err = decode_bytes(br#"[1,"ok"] [2,}"#).unwrap_err();
        match err {
            ConnectionError::Protocol(ProtocolError::MalformedMessage {
                offset, remainder, ..
            }) => {
                assert_eq!(offset, 9);
                assert_eq!(remainder, "[2,}");
            }
            other => panic!("expected MalformedMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_shape_is_rejected() {
        let err = decode_bytes(br#"{"status":"OK"}"#).unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Protocol(ProtocolError::UnknownMessageShape { .. })
        ));
    }

    #[test]
    fn test_decode_eof_with_truncated_value() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&br#"[1,{"status""#[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        let err = decoder.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Protocol(ProtocolError::MalformedMessage { offset: 0, .. })
        ));
    }

    #[test]
    fn test_decode_eof_after_trailing_whitespace() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&b"[3,null]\n"[..]);
        let message = decoder.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(message.as_response().unwrap().request_number, 3);
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }
}
