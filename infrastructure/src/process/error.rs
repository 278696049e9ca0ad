//! Error types for process supervision

use harness_application::ProcessError;
use harness_domain::{LaunchError, ProcessState};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while supervising the debugger server
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to spawn debugger server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    StartupProtocolViolation(#[from] LaunchError),

    #[error("Timed out after {0:?} waiting for the debugger server")]
    Timeout(Duration),

    #[error("Invalid process state transition: {from} -> {to}")]
    InvalidState {
        from: ProcessState,
        to: ProcessState,
    },

    #[error("Failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("Server exited with code {actual:?}, expected {expected}")]
    UnexpectedExitCode { expected: i32, actual: Option<i32> },

    #[error("Processes still running after shutdown: {pids:?}")]
    ProcessLeak { pids: Vec<u32> },

    #[error("Debugger server has not been started")]
    NotStarted,

    #[error("Process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SupervisorError> for ProcessError {
    fn from(error: SupervisorError) -> Self {
        match error {
            SupervisorError::Spawn(e) => ProcessError::Spawn(e.to_string()),
            SupervisorError::StartupProtocolViolation(e) => ProcessError::Startup(e),
            SupervisorError::Timeout(waited) => ProcessError::Timeout(waited),
            SupervisorError::InvalidState { from, to } => ProcessError::InvalidState { from, to },
            SupervisorError::Signal { pid, source } => ProcessError::Signal {
                pid,
                reason: source.to_string(),
            },
            SupervisorError::UnexpectedExitCode { expected, actual } => {
                ProcessError::UnexpectedExitCode { expected, actual }
            }
            SupervisorError::ProcessLeak { pids } => ProcessError::Leak { pids },
            other => ProcessError::Io(other.to_string()),
        }
    }
}
