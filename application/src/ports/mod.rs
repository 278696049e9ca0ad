//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod debugger_process;
pub mod wire_channel;
pub mod wire_logger;
