//! CLI entrypoint for padre-harness
//!
//! This is the main binary that wires together all layers using
//! dependency injection, then runs one smoke session against the server.

use anyhow::{Context, Result, bail};
use clap::Parser;
use harness_application::{DebugSession, HarnessError};
use harness_infrastructure::{
    ConfigLoader, FileConfig, JsonlWireLogger, ProcessSupervisor, TcpConnector, TestWorkspace,
};
use harness_presentation::{Cli, ConsoleFormatter, JsonFormatter, OutputFormat, OutputFormatter};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The exchange with the server failed.
const EXIT_EXCHANGE_FAILED: u8 = 1;
/// The exchange passed but shutdown or the leak check did not.
const EXIT_SHUTDOWN_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        println!();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(program) = cli.program.as_deref() else {
        bail!("PROGRAM is required");
    };

    // Parse every request up front so a typo fails before the server starts
    let requests = cli
        .request
        .iter()
        .map(|raw| {
            serde_json::from_str::<Value>(raw)
                .with_context(|| format!("Invalid --request JSON: {}", raw))
        })
        .collect::<Result<Vec<_>>>()?;

    let harness = config.harness_config();

    // Keep the scratch directory alive until the session is over
    let (program, _workspace) = match &cli.compile {
        Some(compiler) => {
            let (program, workspace) = compile_program(program, compiler, harness.startup_timeout).await?;
            (program, Some(workspace))
        }
        None => (program.to_path_buf(), None),
    };

    // === Dependency Injection ===
    let supervisor = ProcessSupervisor::new(Handle::current(), harness.exit_timeout);
    let connector = Arc::new(TcpConnector::new(config.wire.read_chunk_size));
    let mut session = DebugSession::new(
        config.launch_spec(&program),
        harness,
        Box::new(supervisor),
        connector,
    );

    if let Some(path) = &config.transcript.path {
        let logger = JsonlWireLogger::new(path)
            .with_context(|| format!("Failed to create transcript {}", path.display()))?;
        info!("Writing wire transcript to {}", logger.path().display());
        session = session.with_wire_logger(Arc::new(logger));
    }

    let formatter: Box<dyn OutputFormatter> = match cli.output {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    };

    let mut received = 0;
    let exchange = run_exchange(
        &mut session,
        cli.startup_calls,
        &requests,
        Duration::from_millis(cli.delay),
        formatter.as_ref(),
        &mut received,
    )
    .await;
    if let Err(e) = &exchange {
        println!("{}", formatter.format_failure(e));
    }

    let shutdown = session.shutdown().await;
    if let Err(e) = &shutdown {
        println!("{}", formatter.format_failure(e));
    }

    let failures = usize::from(exchange.is_err()) + usize::from(shutdown.is_err());
    println!("{}", formatter.format_summary(received, failures));

    Ok(match (exchange, shutdown) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        (Err(_), _) => ExitCode::from(EXIT_EXCHANGE_FAILED),
        (Ok(()), Err(_)) => ExitCode::from(EXIT_SHUTDOWN_FAILED),
    })
}

/// Load the merged configuration and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<FileConfig> {
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")?
    };

    if let Some(executable) = &cli.executable {
        config.server.executable = executable.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = Some(port);
    }
    if let Some(debugger) = &cli.debugger {
        config.server.debugger = Some(debugger.clone());
    }
    if let Some(program_type) = &cli.program_type {
        config.server.program_type = Some(program_type.clone());
    }
    if let Some(secs) = cli.io_timeout {
        config.timeouts.io_secs = secs;
    }
    if let Some(path) = &cli.transcript {
        config.transcript.path = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Copy `source` into a scratch directory and compile it there.
async fn compile_program(
    source: &Path,
    compiler: &str,
    timeout: Duration,
) -> Result<(PathBuf, TestWorkspace)> {
    let workspace = TestWorkspace::new()?;
    let copied = workspace.copy_file(source)?;

    let source_name = copied
        .file_name()
        .and_then(|n| n.to_str())
        .context("Source file name is not valid UTF-8")?;
    let output = copied
        .file_stem()
        .and_then(|n| n.to_str())
        .context("Source file name is not valid UTF-8")?;

    let program = workspace
        .compile(source_name, compiler, output, timeout)
        .await?;
    Ok((program, workspace))
}

/// Launch, connect, send every request and print what comes back.
async fn run_exchange(
    session: &mut DebugSession,
    startup_calls: usize,
    requests: &[Value],
    delay: Duration,
    formatter: &dyn OutputFormatter,
    received: &mut usize,
) -> Result<(), HarnessError> {
    session.launch().await?;
    let conn = session.connect().await?;

    if startup_calls > 0 {
        let messages = session.read_messages(conn, startup_calls).await?;
        print_messages(&messages, formatter, received);
    }

    for (index, payload) in requests.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            session.pause(delay).await;
        }
        let number = session.send_request(conn, payload.clone()).await?;
        println!("{}", formatter.format_sent(number, payload));

        let messages = session.collect(conn).await?;
        if messages.is_empty() {
            warn!("No reply to request {} within the read window", number);
        }
        print_messages(&messages, formatter, received);
    }

    session.track_descendants().await?;
    Ok(())
}

fn print_messages(
    messages: &[harness_domain::Message],
    formatter: &dyn OutputFormatter,
    received: &mut usize,
) {
    for message in messages {
        println!("{}", formatter.format_message(message));
    }
    *received += messages.len();
}
