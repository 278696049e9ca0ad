//! Output formatter trait

use harness_application::HarnessError;
use harness_domain::Message;
use serde_json::{Value, json};

/// Trait for formatting session output
pub trait OutputFormatter {
    /// A request the harness sent
    fn format_sent(&self, request_number: i64, payload: &Value) -> String;

    /// A message decoded from the server
    fn format_message(&self, message: &Message) -> String;

    /// A failed step, with whatever arrived before it failed
    fn format_failure(&self, error: &HarnessError) -> String;

    /// Final line of a run
    fn format_summary(&self, received: usize, failures: usize) -> String;
}

/// One compact JSON object per line, for piping into other tools.
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_sent(&self, request_number: i64, payload: &Value) -> String {
        json!({ "sent": [request_number, payload] }).to_string()
    }

    fn format_message(&self, message: &Message) -> String {
        json!({ "received": message.to_value(), "kind": message.kind() }).to_string()
    }

    fn format_failure(&self, error: &HarnessError) -> String {
        let partial: Vec<Value> = error
            .partial_messages()
            .iter()
            .map(Message::to_value)
            .collect();
        json!({
            "error": error.category().as_str(),
            "message": error.to_string(),
            "partial": partial,
        })
        .to_string()
    }

    fn format_summary(&self, received: usize, failures: usize) -> String {
        json!({ "received": received, "failures": failures, "ok": failures == 0 }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_application::ChannelError;
    use harness_domain::Response;
    use std::time::Duration;

    #[test]
    fn test_json_message_line() {
        let message = Message::Response(Response::new(1, json!({"status": "OK"})));
        let line = JsonFormatter.format_message(&message);
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["received"], json!([1, {"status": "OK"}]));
        assert_eq!(value["kind"], "response");
    }

    #[test]
    fn test_json_failure_includes_partial_messages() {
        let error = HarnessError::Channel(ChannelError::Timeout {
            waited: Duration::from_secs(5),
            expected: 2,
            received: vec![Message::Response(Response::new(1, json!("OK")))],
        });
        let value: Value = serde_json::from_str(&JsonFormatter.format_failure(&error)).unwrap();
        assert_eq!(value["error"], "timeout");
        assert_eq!(value["partial"], json!([[1, "OK"]]));
    }
}
