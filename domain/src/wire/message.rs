//! Typed wire messages

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Literal first element of every notification on the wire.
pub const CALL_TAG: &str = "call";

/// An unsolicited `["call", function, args]` message from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub function: String,
    pub args: Vec<Value>,
}

impl Notification {
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

impl Serialize for Notification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (CALL_TAG, &self.function, &self.args).serialize(serializer)
    }
}

/// A `[request_number, body]` message answering an earlier request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_number: i64,
    pub body: Value,
}

impl Response {
    pub fn new(request_number: i64, body: Value) -> Self {
        Self {
            request_number,
            body,
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.request_number, &self.body).serialize(serializer)
    }
}

/// A message received from the server.
///
/// Produced once by [`classify`](super::classifier::classify); everything
/// downstream matches on the variant instead of re-inspecting JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Notification(Notification),
    Response(Response),
}

impl Message {
    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            Message::Notification(n) => Some(n),
            Message::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Message::Response(r) => Some(r),
            Message::Notification(_) => None,
        }
    }

    /// Short label used in logs and transcripts.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Notification(_) => "notification",
            Message::Response(_) => "response",
        }
    }

    /// The message as it appeared on the wire (compact JSON).
    pub fn to_value(&self) -> Value {
        match self {
            Message::Notification(n) => serde_json::json!([CALL_TAG, n.function, n.args]),
            Message::Response(r) => serde_json::json!([r.request_number, r.body]),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// A client request, sent as `[number, payload]`.
///
/// `payload` is usually an object with a `cmd` field, e.g.
/// `{"cmd":"breakpoint","file":"test_prog.c","line":16}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub number: i64,
    pub payload: Value,
}

impl Request {
    pub fn new(number: i64, payload: Value) -> Self {
        Self { number, payload }
    }

    /// Compact JSON encoding with no extraneous whitespace.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.number, &self.payload).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_encodes_compactly() {
        let request = Request::new(
            1,
            json!({"cmd": "breakpoint", "file": "test_prog.c", "line": 16}),
        );
        let bytes = request.encode().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"[1,{"cmd":"breakpoint","file":"test_prog.c","line":16}]"#
        );
    }

    #[test]
    fn test_notification_serializes_with_call_tag() {
        let message = Message::Notification(Notification::new(
            "padre#debugger#JumpToPosition",
            vec![json!("test_prog.c"), json!(2)],
        ));
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"["call","padre#debugger#JumpToPosition",["test_prog.c",2]]"#
        );
        assert_eq!(message.to_string(), serde_json::to_string(&message).unwrap());
    }

    #[test]
    fn test_response_accessors() {
        let message = Message::Response(Response::new(4, json!({"status": "OK"})));
        assert_eq!(message.kind(), "response");
        assert!(message.as_notification().is_none());
        assert_eq!(message.as_response().unwrap().request_number, 4);
        assert_eq!(message.to_string(), r#"[4,{"status":"OK"}]"#);
    }
}
