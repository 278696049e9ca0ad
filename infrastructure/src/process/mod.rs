//! Debugger server process supervision.
//!
//! - [`supervisor::ProcessSupervisor`] implements the `DebuggerProcess` port
//! - [`table`] reads the OS process table

pub mod error;
pub mod supervisor;
pub mod table;
