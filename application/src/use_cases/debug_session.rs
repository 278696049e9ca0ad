//! Debug session use case
//!
//! Drives one debugger server through a scripted conversation: launch it,
//! open connections, send numbered requests, wait for the expected responses
//! and notifications, then shut everything down and check for leaks.

use crate::config::HarnessConfig;
use crate::ports::debugger_process::{DebuggerProcess, ProcessError};
use crate::ports::wire_channel::{ChannelError, Connector, MessageChannel};
use crate::ports::wire_logger::{NoWireLogger, WireEvent, WireLogger};
use harness_domain::{
    CorrelatorError, Expectation, ExpectedCall, LaunchSpec, MatchError, Message, ProcessState,
    Request, RequestCorrelator, Response, expected_count, verify_all,
};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Commands after which the server is likely to have spawned a debuggee.
const SPAWNING_COMMANDS: &[&str] = &["run"];

/// Errors that can fail a debug session step
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Correlator(#[from] CorrelatorError),

    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("Server has not been launched")]
    NotLaunched,

    #[error("Failed to encode request: {0}")]
    Encode(String),
}

/// Coarse failure kind, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The server sent bytes that are not a valid message.
    Protocol,
    /// Messages arrived but did not satisfy an expectation.
    Assertion,
    /// An expected message or process event never happened in time.
    Timeout,
    /// The server or a debuggee outlived shutdown.
    Leak,
    /// Anything else about the server process.
    Process,
    /// The session was driven out of order.
    Usage,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Protocol => "protocol",
            FailureCategory::Assertion => "assertion",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Leak => "leak",
            FailureCategory::Process => "process",
            FailureCategory::Usage => "usage",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HarnessError {
    pub fn category(&self) -> FailureCategory {
        match self {
            HarnessError::Channel(ChannelError::Protocol(_)) => FailureCategory::Protocol,
            HarnessError::Channel(ChannelError::Timeout { .. }) => FailureCategory::Timeout,
            HarnessError::Channel(_) => FailureCategory::Process,
            HarnessError::Process(e) if e.is_leak() => FailureCategory::Leak,
            HarnessError::Process(e) if e.is_timeout() => FailureCategory::Timeout,
            HarnessError::Process(_) => FailureCategory::Process,
            HarnessError::Match(_) => FailureCategory::Assertion,
            HarnessError::Correlator(_)
            | HarnessError::UnknownConnection(_)
            | HarnessError::NotLaunched
            | HarnessError::Encode(_) => FailureCategory::Usage,
        }
    }

    pub fn is_leak(&self) -> bool {
        self.category() == FailureCategory::Leak
    }

    pub fn is_timeout(&self) -> bool {
        self.category() == FailureCategory::Timeout
    }

    /// Messages that did arrive before a read failed.
    pub fn partial_messages(&self) -> &[Message] {
        match self {
            HarnessError::Channel(e) => e.partial(),
            _ => &[],
        }
    }
}

/// Handle to one of the session's connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One debugger server under test.
///
/// Owns the request correlator, so request numbers are unique across every
/// connection of the session.
pub struct DebugSession {
    spec: LaunchSpec,
    config: HarnessConfig,
    correlator: RequestCorrelator,
    process: Box<dyn DebuggerProcess>,
    connector: Arc<dyn Connector>,
    connections: Vec<Option<Box<dyn MessageChannel>>>,
    wire_logger: Arc<dyn WireLogger>,
    port: Option<u16>,
    track_pending: bool,
}

impl DebugSession {
    pub fn new(
        spec: LaunchSpec,
        config: HarnessConfig,
        process: Box<dyn DebuggerProcess>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            spec,
            config,
            correlator: RequestCorrelator::new(),
            process,
            connector,
            connections: Vec::new(),
            wire_logger: Arc::new(NoWireLogger),
            port: None,
            track_pending: false,
        }
    }

    pub fn with_wire_logger(mut self, logger: Arc<dyn WireLogger>) -> Self {
        self.wire_logger = logger;
        self
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    pub fn process(&self) -> &dyn DebuggerProcess {
        self.process.as_ref()
    }

    /// Port the server listens on, once known.
    pub fn port(&self) -> Option<u16> {
        self.port.or(self.spec.listen.port)
    }

    /// Fix the listening port, allocating a free one on first use if the
    /// launch spec left it open and allocation is enabled.
    pub fn ensure_port(&mut self) -> Result<Option<u16>, HarnessError> {
        if self.spec.listen.port.is_none() && self.config.allocate_port {
            let port = self.connector.allocate_port(&self.spec.listen.host)?;
            debug!("Allocated port {} for debugger server", port);
            self.spec.listen.port = Some(port);
        }
        Ok(self.spec.listen.port)
    }

    /// Start the server and wait for its startup banner.
    ///
    /// A server that fails the handshake is left in `Starting`;
    /// [`shutdown`](Self::shutdown) stops it, killing it if needed.
    pub async fn launch(&mut self) -> Result<u16, HarnessError> {
        self.ensure_port()?;
        info!(
            "Launching {} for {}",
            self.spec.executable.display(),
            self.spec.program.display()
        );

        let port = self
            .process
            .start(&self.spec, self.config.startup_timeout)
            .await?;
        self.port = Some(port);

        self.wire_logger.log(WireEvent::new(
            "process",
            json!({
                "state": self.process.state(),
                "pid": self.process.pid(),
                "port": port,
            }),
        ));
        info!("Debugger server listening on port {}", port);
        Ok(port)
    }

    /// Open a new connection to the running server.
    pub async fn connect(&mut self) -> Result<ConnectionId, HarnessError> {
        let port = self.port.ok_or(HarnessError::NotLaunched)?;
        let channel = self
            .connector
            .connect(&self.spec.listen.host, port, self.config.connect_timeout)
            .await?;

        let id = ConnectionId(self.connections.len());
        debug!("Connection {} opened to {}", id, channel.peer());
        self.connections.push(Some(channel));
        Ok(id)
    }

    fn channel(&mut self, id: ConnectionId) -> Result<&mut Box<dyn MessageChannel>, HarnessError> {
        self.connections
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(HarnessError::UnknownConnection(id))
    }

    /// Send `payload` as the next numbered request on `conn`.
    ///
    /// Returns the request number used.
    pub async fn send_request(
        &mut self,
        conn: ConnectionId,
        payload: Value,
    ) -> Result<i64, HarnessError> {
        if payload
            .get("cmd")
            .and_then(Value::as_str)
            .is_some_and(|cmd| SPAWNING_COMMANDS.contains(&cmd))
        {
            self.track_pending = true;
        }

        let number = self.correlator.next_request_number();
        let request = Request::new(number, payload);
        let bytes = request
            .encode()
            .map_err(|e| HarnessError::Encode(e.to_string()))?;

        self.send_raw(conn, &bytes).await?;
        debug!("Sent request {} on connection {}", number, conn);
        Ok(number)
    }

    /// Write raw bytes on `conn` without numbering them.
    pub async fn send_raw(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<(), HarnessError> {
        let timeout = self.config.io_timeout;
        self.channel(conn)?.send(bytes, timeout).await?;
        self.wire_logger.log(WireEvent::new(
            "sent",
            json!({
                "connection": conn.0,
                "data": String::from_utf8_lossy(bytes),
            }),
        ));
        Ok(())
    }

    /// Read at least `expected` messages from `conn`.
    pub async fn read_messages(
        &mut self,
        conn: ConnectionId,
        expected: usize,
    ) -> Result<Vec<Message>, HarnessError> {
        let timeout = self.config.io_timeout;
        let result = self.channel(conn)?.read_messages(expected, timeout).await;

        let received = match &result {
            Ok(messages) => messages.as_slice(),
            Err(e) => e.partial(),
        };
        for message in received {
            let mut payload = json!({ "connection": conn.0, "message": message.to_value() });
            if let Some(response) = message.as_response()
                && !self.correlator.was_issued(response.request_number)
            {
                warn!(
                    "Response to request {} that was never sent",
                    response.request_number
                );
                payload["unsolicited"] = Value::Bool(true);
            }
            self.wire_logger.log(WireEvent::new("received", payload));
        }

        result.map_err(HarnessError::from)
    }

    /// Everything the server sends on `conn` within one I/O window.
    pub async fn collect(&mut self, conn: ConnectionId) -> Result<Vec<Message>, HarnessError> {
        match self.read_messages(conn, usize::MAX).await {
            Err(HarnessError::Channel(ChannelError::Timeout { received, .. })) => Ok(received),
            other => other,
        }
    }

    /// Read exactly as many messages as `expectations` account for and
    /// verify every expectation against them.
    pub async fn expect(
        &mut self,
        conn: ConnectionId,
        expectations: &[Expectation],
    ) -> Result<Vec<Message>, HarnessError> {
        let messages = self
            .read_messages(conn, expected_count(expectations))
            .await?;
        verify_all(expectations, &messages)?;

        if std::mem::take(&mut self.track_pending) {
            self.track_descendants().await?;
        }
        Ok(messages)
    }

    /// Expect one response to the most recent request.
    pub async fn expect_response(
        &mut self,
        conn: ConnectionId,
        body: Value,
    ) -> Result<Response, HarnessError> {
        let request_number = self.correlator.last_request_number()?;
        let messages = self
            .expect(
                conn,
                &[Expectation::Response {
                    request_number,
                    body,
                }],
            )
            .await?;

        messages
            .into_iter()
            .find_map(|m| match m {
                Message::Response(response) => Some(response),
                Message::Notification(_) => None,
            })
            .ok_or(HarnessError::Match(MatchError::ResponseCountMismatch {
                request_number,
                found: 0,
            }))
    }

    /// Expect exactly these notifications, in any order.
    pub async fn expect_calls(
        &mut self,
        conn: ConnectionId,
        calls: Vec<ExpectedCall>,
    ) -> Result<Vec<Message>, HarnessError> {
        self.expect(conn, &[Expectation::Calls(calls)]).await
    }

    /// Expect a response to the most recent request together with these
    /// notifications, in any relative order.
    pub async fn expect_response_and_calls(
        &mut self,
        conn: ConnectionId,
        body: Value,
        calls: Vec<ExpectedCall>,
    ) -> Result<Vec<Message>, HarnessError> {
        let request_number = self.correlator.last_request_number()?;
        self.expect(
            conn,
            &[
                Expectation::Response {
                    request_number,
                    body,
                },
                Expectation::Calls(calls),
            ],
        )
        .await
    }

    /// Record every current descendant of the server.
    pub async fn track_descendants(&mut self) -> Result<usize, HarnessError> {
        let added = self.process.track_descendants().await?;
        if added > 0 {
            debug!(
                "Tracking {} new process(es), {} total",
                added,
                self.process.tree().len()
            );
        }
        Ok(added)
    }

    /// Type a line into the server's terminal.
    pub async fn send_terminal_input(&mut self, line: &str) -> Result<(), HarnessError> {
        self.process
            .send_line(line, self.config.io_timeout)
            .await?;
        self.wire_logger
            .log(WireEvent::new("stdin", json!({ "line": line })));
        Ok(())
    }

    /// Let the server settle between steps.
    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Close one connection. Closing twice is a no-op.
    pub async fn close(&mut self, conn: ConnectionId) {
        if let Some(mut channel) = self.connections.get_mut(conn.0).and_then(Option::take) {
            channel.close().await;
            debug!("Connection {} closed", conn);
        }
    }

    /// Close every connection, interrupt the server and verify that it and
    /// every tracked descendant are gone.
    ///
    /// On failure the remaining processes are killed before the error is
    /// returned.
    pub async fn shutdown(&mut self) -> Result<(), HarnessError> {
        for index in 0..self.connections.len() {
            self.close(ConnectionId(index)).await;
        }

        if matches!(
            self.process.state(),
            ProcessState::NotStarted | ProcessState::Terminated
        ) {
            return Ok(());
        }

        let result = self.stop_server().await;
        self.wire_logger.log(WireEvent::new(
            "process",
            json!({
                "state": self.process.state(),
                "pids": self.process.tree().pids().collect::<Vec<_>>(),
                "error": result.as_ref().err().map(ToString::to_string),
            }),
        ));

        if let Err(e) = &result {
            warn!("Shutdown failed ({}), killing remaining processes", e);
            if let Err(kill_err) = self.process.kill().await {
                warn!("Failed to kill remaining processes: {}", kill_err);
            }
        }
        result
    }

    async fn stop_server(&mut self) -> Result<(), HarnessError> {
        self.track_descendants().await?;
        self.process.terminate().await?;
        self.process
            .assert_fully_stopped(&self.config.shutdown)
            .await?;
        info!("Debugger server stopped cleanly");
        Ok(())
    }
}
