//! Debugger process port
//!
//! Defines the interface for supervising the debugger server subprocess.

use crate::config::ShutdownPolicy;
use async_trait::async_trait;
use harness_domain::{LaunchError, LaunchSpec, ProcessState, ProcessTree};
use std::time::Duration;
use thiserror::Error;

/// Errors from process supervision.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn debugger server: {0}")]
    Spawn(String),

    #[error(transparent)]
    Startup(#[from] LaunchError),

    #[error("Timed out after {0:?} waiting for the debugger server")]
    Timeout(Duration),

    #[error("Invalid process state transition: {from} -> {to}")]
    InvalidState {
        from: ProcessState,
        to: ProcessState,
    },

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("Server exited with code {actual:?}, expected {expected}")]
    UnexpectedExitCode { expected: i32, actual: Option<i32> },

    #[error("Processes still running after shutdown: {pids:?}")]
    Leak { pids: Vec<u32> },

    #[error("I/O error: {0}")]
    Io(String),
}

impl ProcessError {
    pub fn is_leak(&self) -> bool {
        matches!(self, ProcessError::Leak { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout(_))
    }
}

/// Supervises one debugger server process and its descendants.
#[async_trait]
pub trait DebuggerProcess: Send {
    fn state(&self) -> ProcessState;

    /// OS pid of the server, once spawned.
    fn pid(&self) -> Option<u32>;

    /// Every process observed so far.
    fn tree(&self) -> &ProcessTree;

    /// Spawn the server and wait for its startup banner.
    ///
    /// Returns the port the server reports listening on.
    async fn start(&mut self, spec: &LaunchSpec, timeout: Duration) -> Result<u16, ProcessError>;

    /// Snapshot the OS process table and add every live descendant of the
    /// server to the tree. Returns how many pids were newly recorded.
    async fn track_descendants(&mut self) -> Result<usize, ProcessError>;

    /// Write one line to the server's standard input.
    async fn send_line(&mut self, line: &str, timeout: Duration) -> Result<(), ProcessError>;

    /// Ask the server to shut down (interrupt signal).
    async fn terminate(&mut self) -> Result<(), ProcessError>;

    /// Wait for the exit code, or `None` if the process was killed by a signal.
    async fn wait_for_exit(&mut self, timeout: Duration) -> Result<Option<i32>, ProcessError>;

    /// Verify the server exited with the expected code and that no tracked
    /// process is still alive.
    async fn assert_fully_stopped(&mut self, policy: &ShutdownPolicy) -> Result<(), ProcessError>;

    /// Forcefully kill the server and every tracked descendant.
    async fn kill(&mut self) -> Result<(), ProcessError>;
}
