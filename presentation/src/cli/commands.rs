//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for decoded messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, human-readable lines
    Text,
    /// One compact JSON value per line
    Json,
}

/// CLI arguments for padre-harness
#[derive(Parser, Debug)]
#[command(name = "padre-harness")]
#[command(author, version, about = "Drive a PADRE debugger server over its wire protocol")]
#[command(long_about = r#"
padre-harness launches a PADRE debugger server for a program, connects to it,
sends requests and prints every message the server sends back. On exit it
interrupts the server and checks that it and every process it spawned are gone.

Requests are JSON payloads; the harness numbers them and sends
`[<number>, <payload>]`. Responses and `["call", <function>, <args>]`
notifications are printed as they are decoded.

Configuration files are loaded from (in priority order):
1. PADRE_HARNESS_* environment variables
2. --config <path>           Explicit config file
3. ./padre-harness.toml      Project-level config
4. ~/.config/padre-harness/config.toml   Global config

Example:
  padre-harness ./test_prog --request '{"cmd":"breakpoint","file":"test_prog.c","line":16}'
  padre-harness ./test_prog --startup-calls 1 --request '{"cmd":"run"}'
  padre-harness test_prog.c --compile "gcc -g -O0" --request '{"cmd":"run"}'
"#)]
pub struct Cli {
    /// Program to debug (or source file with --compile)
    #[arg(required_unless_present = "show_config")]
    pub program: Option<PathBuf>,

    /// Request payload to send, in order (can be specified multiple times)
    #[arg(short, long, value_name = "JSON")]
    pub request: Vec<String>,

    /// Notifications to wait for after connecting, before the first request
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub startup_calls: usize,

    /// Milliseconds to wait between requests
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub delay: u64,

    /// Compile PROGRAM with this compiler command in a scratch directory first
    #[arg(long, value_name = "COMPILER")]
    pub compile: Option<String>,

    /// Debugger server binary
    #[arg(short, long, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Fixed port for the server
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Debugger backend name
    #[arg(long, value_name = "NAME")]
    pub debugger: Option<String>,

    /// Program type tag
    #[arg(long = "type", value_name = "TYPE")]
    pub program_type: Option<String>,

    /// Seconds to wait for each read window
    #[arg(long, value_name = "SECS")]
    pub io_timeout: Option<u64>,

    /// Write a JSONL transcript of the wire exchange
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration sources and the merged configuration, then exit
    #[arg(long)]
    pub show_config: bool,
}
