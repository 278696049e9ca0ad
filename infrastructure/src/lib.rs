//! Infrastructure layer for padre-harness
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: TCP connections, process supervision,
//! the wire transcript, plus configuration file loading and test-program
//! fixtures.

pub mod config;
pub mod fixtures;
pub mod logging;
pub mod process;
pub mod wire;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use fixtures::{FixtureError, TestWorkspace};
pub use logging::JsonlWireLogger;
pub use process::{error::SupervisorError, supervisor::ProcessSupervisor};
pub use wire::{
    codec::FrameDecoder,
    connection::{DEFAULT_READ_CHUNK, TcpConnection, TcpConnector, unused_local_port},
    error::ConnectionError,
};
