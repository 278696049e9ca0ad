//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain and application
//! types once validated.

use harness_application::{HarnessConfig, ShutdownPolicy};
use harness_domain::{DEFAULT_HOST, LaunchSpec, ListenAddress};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::wire::connection::DEFAULT_READ_CHUNK;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("timeouts.{0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("wire.read_chunk_size cannot be 0")]
    ZeroChunkSize,

    #[error("shutdown.poll_retries cannot be 0")]
    ZeroPollRetries,

    #[error("server.executable cannot be empty")]
    EmptyExecutable,
}

/// Raw server configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    /// Debugger server binary
    pub executable: PathBuf,
    /// Address the server listens on
    pub host: String,
    /// Fixed port; a free one is picked when unset
    pub port: Option<u16>,
    /// Pick a free port when `port` is unset. When off, the port is read
    /// from the startup banner instead.
    pub allocate_port: bool,
    /// Debugger backend name
    pub debugger: Option<String>,
    /// Program type tag passed as `--type`
    pub program_type: Option<String>,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("padre"),
            host: DEFAULT_HOST.to_string(),
            port: None,
            allocate_port: true,
            debugger: None,
            program_type: None,
        }
    }
}

/// Raw timeout configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTimeoutsConfig {
    /// Waiting for the startup banner
    pub startup_secs: u64,
    /// Each socket read window and each write
    pub io_secs: u64,
    /// Connecting to the server, retries included
    pub connect_secs: u64,
    /// Waiting for the server to exit
    pub exit_secs: u64,
}

impl Default for FileTimeoutsConfig {
    fn default() -> Self {
        Self {
            startup_secs: 5,
            io_secs: 5,
            connect_secs: 3,
            exit_secs: 5,
        }
    }
}

/// Raw wire configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWireConfig {
    /// Bytes requested per socket read
    pub read_chunk_size: usize,
}

impl Default for FileWireConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

/// Raw shutdown configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileShutdownConfig {
    pub expected_exit_code: i32,
    pub poll_interval_ms: u64,
    pub poll_retries: u32,
}

impl Default for FileShutdownConfig {
    fn default() -> Self {
        Self {
            expected_exit_code: 0,
            poll_interval_ms: 100,
            poll_retries: 50,
        }
    }
}

/// Raw transcript configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTranscriptConfig {
    /// JSONL file receiving every wire event
    pub path: Option<PathBuf>,
}

/// Complete configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: FileServerConfig,
    pub timeouts: FileTimeoutsConfig,
    pub wire: FileWireConfig,
    pub shutdown: FileShutdownConfig,
    pub transcript: FileTranscriptConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let timeouts = [
            ("startup_secs", self.timeouts.startup_secs),
            ("io_secs", self.timeouts.io_secs),
            ("connect_secs", self.timeouts.connect_secs),
            ("exit_secs", self.timeouts.exit_secs),
        ];
        if let Some(&(name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigValidationError::ZeroTimeout(name));
        }

        if self.wire.read_chunk_size == 0 {
            return Err(ConfigValidationError::ZeroChunkSize);
        }

        if self.shutdown.poll_retries == 0 {
            return Err(ConfigValidationError::ZeroPollRetries);
        }

        if self.server.executable.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyExecutable);
        }

        Ok(())
    }

    /// Session behavior derived from this file.
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            startup_timeout: Duration::from_secs(self.timeouts.startup_secs),
            io_timeout: Duration::from_secs(self.timeouts.io_secs),
            connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
            exit_timeout: Duration::from_secs(self.timeouts.exit_secs),
            allocate_port: self.server.allocate_port,
            shutdown: ShutdownPolicy {
                expected_exit_code: self.shutdown.expected_exit_code,
                poll_interval: Duration::from_millis(self.shutdown.poll_interval_ms),
                poll_retries: self.shutdown.poll_retries,
            },
        }
    }

    /// How to launch the server for `program`.
    pub fn launch_spec(&self, program: &Path) -> LaunchSpec {
        let mut spec = LaunchSpec::new(&self.server.executable, program).with_listen(
            ListenAddress::new(self.server.host.clone(), self.server.port),
        );
        if let Some(debugger) = &self.server.debugger {
            spec = spec.with_debugger(debugger.clone());
        }
        if let Some(program_type) = &self.server.program_type {
            spec = spec.with_program_type(program_type.clone());
        }
        spec
    }
}
