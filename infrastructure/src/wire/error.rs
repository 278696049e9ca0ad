//! Error types for the wire adapter

use harness_application::ChannelError;
use harness_domain::{Message, ProtocolError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur on a connection to the debugger server
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timed out after {waited:?} with {} of {expected} message(s)", .received.len())]
    Timeout {
        waited: Duration,
        expected: usize,
        received: Vec<Message>,
    },

    #[error("Connection closed by peer after {} message(s)", .received.len())]
    Closed { received: Vec<Message> },

    #[error("Connection already closed")]
    NotConnected,
}

impl From<ConnectionError> for ChannelError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::Protocol(e) => ChannelError::Protocol(e),
            ConnectionError::Timeout {
                waited,
                expected,
                received,
            } => ChannelError::Timeout {
                waited,
                expected,
                received,
            },
            ConnectionError::Closed { received } => ChannelError::Closed { received },
            other => ChannelError::Connection(other.to_string()),
        }
    }
}
