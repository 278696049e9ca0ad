//! Server invocation and startup handshake.
//!
//! The debugger server is started as
//!
//! ```text
//! padre --host=<addr> --port=<port> [--type=<type>] [--debugger=<backend>] <program>
//! ```
//!
//! and must print exactly `Listening on <host>:<port>\n` as its first line
//! of standard output.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default interface the server is asked to bind.
pub const DEFAULT_HOST: &str = "127.0.0.1";

const BANNER_PREFIX: &str = "Listening on ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Startup protocol violation: expected {expected:?}, got {actual:?}")]
    StartupProtocolViolation { expected: String, actual: String },
}

/// The exact startup line for `host:port`, including the trailing newline.
pub fn startup_banner(host: &str, port: u16) -> String {
    format!("{BANNER_PREFIX}{host}:{port}\n")
}

/// Where the server should listen.
///
/// `port: None` lets the server choose; the port is then read back from
/// the startup banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl Default for ListenAddress {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
        }
    }
}

impl ListenAddress {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Check the server's first output line and return the bound port.
    ///
    /// With a fixed port the line must equal [`startup_banner`] exactly.
    /// Without one, the line must still name this host and end in a newline.
    pub fn check_banner(&self, line: &str) -> Result<u16, LaunchError> {
        if let Some(port) = self.port {
            let expected = startup_banner(&self.host, port);
            if line == expected {
                return Ok(port);
            }
            return Err(LaunchError::StartupProtocolViolation {
                expected,
                actual: line.to_string(),
            });
        }

        let violation = || LaunchError::StartupProtocolViolation {
            expected: format!("{BANNER_PREFIX}{}:<port>\n", self.host),
            actual: line.to_string(),
        };

        let address = line
            .strip_suffix('\n')
            .and_then(|l| l.strip_prefix(BANNER_PREFIX))
            .ok_or_else(violation)?;
        let (host, port) = address.rsplit_once(':').ok_or_else(violation)?;
        if host != self.host {
            return Err(violation());
        }
        port.parse::<u16>().map_err(|_| violation())
    }
}

/// Everything needed to start one debugger server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// The debugger server binary.
    pub executable: PathBuf,
    /// The program the server should debug.
    pub program: PathBuf,
    /// Program type tag, e.g. `lldb`, `node`, `python`.
    pub program_type: Option<String>,
    /// Debugger backend name.
    pub debugger: Option<String>,
    pub listen: ListenAddress,
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(executable: impl Into<PathBuf>, program: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            program: program.into(),
            program_type: None,
            debugger: None,
            listen: ListenAddress::default(),
            working_dir: None,
        }
    }

    pub fn with_program_type(mut self, program_type: impl Into<String>) -> Self {
        self.program_type = Some(program_type.into());
        self
    }

    pub fn with_debugger(mut self, debugger: impl Into<String>) -> Self {
        self.debugger = Some(debugger.into());
        self
    }

    pub fn with_listen(mut self, listen: ListenAddress) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Command-line arguments for the server binary.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![format!("--host={}", self.listen.host)];
        if let Some(port) = self.listen.port {
            args.push(format!("--port={port}"));
        }
        if let Some(program_type) = &self.program_type {
            args.push(format!("--type={program_type}"));
        }
        if let Some(debugger) = &self.debugger {
            args.push(format!("--debugger={debugger}"));
        }
        args.push(self.program.to_string_lossy().into_owned());
        args
    }
}
