//! Application layer for padre-harness
//!
//! This crate contains the debug session use case, the port definitions it
//! drives, and harness configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{HarnessConfig, ShutdownPolicy};
pub use ports::{
    debugger_process::{DebuggerProcess, ProcessError},
    wire_channel::{ChannelError, Connector, MessageChannel},
    wire_logger::{NoWireLogger, WireEvent, WireLogger},
};
pub use use_cases::debug_session::{ConnectionId, DebugSession, FailureCategory, HarnessError};
