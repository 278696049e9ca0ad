//! Message classification.
//!
//! Notifications and responses share one byte stream and one outer shape
//! (a JSON array), so a value is classified only after it has been fully
//! decoded:
//!
//! - `["call", "<function>", [<args>...]]` → [`Message::Notification`]
//! - `[<integer>, <body>]` → [`Message::Response`]
//! - anything else → [`ProtocolError::UnknownMessageShape`]

use super::error::ProtocolError;
use super::message::{CALL_TAG, Message, Notification, Response};
use serde_json::Value;

/// Classify one decoded JSON value.
///
/// Makes no assumption about ordering relative to other messages.
pub fn classify(value: Value) -> Result<Message, ProtocolError> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(ProtocolError::unknown_shape(&other)),
    };

    match items.first() {
        Some(Value::String(tag)) if tag == CALL_TAG => classify_call(items),
        Some(Value::Number(_)) => classify_response(items),
        _ => Err(ProtocolError::unknown_shape(&Value::Array(items))),
    }
}

fn classify_call(items: Vec<Value>) -> Result<Message, ProtocolError> {
    match <[Value; 3]>::try_from(items) {
        Ok([_, Value::String(function), Value::Array(args)]) => {
            Ok(Message::Notification(Notification { function, args }))
        }
        Ok(items) => Err(ProtocolError::unknown_shape(&Value::Array(items.into()))),
        Err(items) => Err(ProtocolError::unknown_shape(&Value::Array(items))),
    }
}

fn classify_response(items: Vec<Value>) -> Result<Message, ProtocolError> {
    match <[Value; 2]>::try_from(items) {
        Ok([Value::Number(number), body]) => match number.as_i64() {
            Some(request_number) => Ok(Message::Response(Response {
                request_number,
                body,
            })),
            None => Err(ProtocolError::unknown_shape(&Value::Array(vec![
                Value::Number(number),
                body,
            ]))),
        },
        Ok(items) => Err(ProtocolError::unknown_shape(&Value::Array(items.into()))),
        Err(items) => Err(ProtocolError::unknown_shape(&Value::Array(items))),
    }
}
