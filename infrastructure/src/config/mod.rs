//! Configuration file loading for padre-harness
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `PADRE_HARNESS_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./padre-harness.toml` or `./.padre-harness.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/padre-harness/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileServerConfig, FileShutdownConfig, FileTimeoutsConfig,
    FileTranscriptConfig, FileWireConfig,
};
pub use loader::{ConfigLoader, ENV_PREFIX};
