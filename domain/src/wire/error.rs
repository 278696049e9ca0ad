//! Protocol violation errors

use thiserror::Error;

/// Errors raised when the server breaks the wire protocol.
///
/// These are never retried: a malformed stream is a defect in the server
/// under test, so the raw offending text is kept for diagnosis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message at byte {offset}: {reason}\nRaw remainder: {remainder}")]
    MalformedMessage {
        offset: usize,
        reason: String,
        remainder: String,
    },

    #[error("Unknown message shape: {raw}")]
    UnknownMessageShape { raw: String },
}

impl ProtocolError {
    pub(crate) fn unknown_shape(value: &serde_json::Value) -> Self {
        ProtocolError::UnknownMessageShape {
            raw: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_display_includes_remainder() {
        let error = ProtocolError::MalformedMessage {
            offset: 7,
            reason: "expected value".to_string(),
            remainder: "[1,}".to_string(),
        };
        let text = error.to_string();
        assert!(text.contains("byte 7"));
        assert!(text.contains("Raw remainder: [1,}"));
    }

    #[test]
    fn test_unknown_shape_keeps_compact_raw_value() {
        let error = ProtocolError::unknown_shape(&serde_json::json!({"cmd": "run"}));
        assert_eq!(error.to_string(), r#"Unknown message shape: {"cmd":"run"}"#);
    }
}
