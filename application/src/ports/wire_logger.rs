//! Port for the wire transcript.
//!
//! Defines the [`WireLogger`] trait for recording every byte exchange with
//! the server (requests sent, messages received, terminal input, process
//! lifecycle) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures a machine-readable
//! transcript (JSONL) of one session.

use serde_json::Value;

/// A structured wire event.
pub struct WireEvent {
    /// Event type identifier (`sent`, `received`, `stdin`, `process`).
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl WireEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging wire events.
///
/// Synchronous and non-fallible so that a broken transcript never fails a
/// test; write errors are dropped.
pub trait WireLogger: Send + Sync {
    fn log(&self, event: WireEvent);
}

/// No-op implementation for tests and when no transcript is requested.
pub struct NoWireLogger;

impl WireLogger for NoWireLogger {
    fn log(&self, _event: WireEvent) {}
}
