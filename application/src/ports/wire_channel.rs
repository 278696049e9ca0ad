//! Wire channel port
//!
//! Defines how the session talks to the debugger server over one socket.

use async_trait::async_trait;
use harness_domain::{Message, ProtocolError};
use std::time::Duration;
use thiserror::Error;

/// Errors from a wire channel.
///
/// `Timeout` and `Closed` carry every message decoded before the failure so
/// callers can report which expected messages never arrived.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Timed out after {waited:?} with {} of {expected} message(s)", .received.len())]
    Timeout {
        waited: Duration,
        expected: usize,
        received: Vec<Message>,
    },

    #[error("Connection closed by peer after {} message(s)", .received.len())]
    Closed { received: Vec<Message> },
}

impl ChannelError {
    /// Messages decoded before the failure.
    pub fn partial(&self) -> &[Message] {
        match self {
            ChannelError::Timeout { received, .. } | ChannelError::Closed { received } => received,
            ChannelError::Connection(_) | ChannelError::Protocol(_) => &[],
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ChannelError::Timeout { .. })
    }
}

/// One connection to the server.
///
/// Each channel owns its own inbound buffer; only one reader drains it at a
/// time, which `&mut self` enforces.
#[async_trait]
pub trait MessageChannel: Send {
    /// Human-readable peer address, for logs.
    fn peer(&self) -> String;

    /// Write raw bytes, bounded by `timeout`.
    async fn send(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), ChannelError>;

    /// Read until at least `expected` messages are decoded or `timeout`
    /// elapses. Messages are returned in the order the peer wrote them.
    async fn read_messages(
        &mut self,
        expected: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, ChannelError>;

    /// Release the socket. Idempotent.
    async fn close(&mut self);
}

/// Opens channels to a listening server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn MessageChannel>, ChannelError>;

    /// Find a port on `host` that nothing is listening on.
    fn allocate_port(&self, host: &str) -> Result<u16, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_domain::Response;
    use serde_json::json;

    #[test]
    fn test_timeout_keeps_partial_messages() {
        let error = ChannelError::Timeout {
            waited: Duration::from_secs(5),
            expected: 2,
            received: vec![Message::Response(Response::new(1, json!({"status": "OK"})))],
        };
        assert!(error.is_timeout());
        assert_eq!(error.partial().len(), 1);
        assert_eq!(error.to_string(), "Timed out after 5s with 1 of 2 message(s)");
    }

    #[test]
    fn test_protocol_error_has_no_partial() {
        let error = ChannelError::from(ProtocolError::UnknownMessageShape {
            raw: "{}".to_string(),
        });
        assert!(error.partial().is_empty());
        assert!(!error.is_timeout());
    }
}
