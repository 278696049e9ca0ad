//! Application-level configuration.
//!
//! Deadlines and shutdown policy for a debug session. Every suspension in
//! the harness is bounded by one of these.

use std::time::Duration;

/// How a session waits for the server to shut down cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownPolicy {
    /// Exit code a graceful shutdown must report.
    pub expected_exit_code: i32,
    /// Delay between exit-code and process-table polls.
    pub poll_interval: Duration,
    /// Number of polls before giving up.
    pub poll_retries: u32,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            expected_exit_code: 0,
            poll_interval: Duration::from_millis(100),
            poll_retries: 50,
        }
    }
}

impl ShutdownPolicy {
    /// Upper bound on the time spent polling.
    pub fn window(&self) -> Duration {
        self.poll_interval * self.poll_retries
    }
}

/// Harness behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Waiting for the startup banner.
    pub startup_timeout: Duration,
    /// Each socket read window and each write.
    pub io_timeout: Duration,
    /// Connecting to the server, including retries.
    pub connect_timeout: Duration,
    /// Waiting for the server to exit after a signal.
    pub exit_timeout: Duration,
    /// Ask the OS for a free port when none is fixed. When off, the port is
    /// read back from the startup banner.
    pub allocate_port: bool,
    pub shutdown: ShutdownPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            exit_timeout: Duration::from_secs(5),
            allocate_port: true,
            shutdown: ShutdownPolicy::default(),
        }
    }
}

impl HarnessConfig {
    /// Use the same deadline for every I/O wait.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            startup_timeout: timeout,
            io_timeout: timeout,
            connect_timeout: timeout,
            exit_timeout: timeout,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shutdown_window() {
        let policy = ShutdownPolicy::default();
        assert_eq!(policy.window(), Duration::from_secs(5));
        assert_eq!(policy.expected_exit_code, 0);
    }

    #[test]
    fn test_with_timeout() {
        let config = HarnessConfig::with_timeout(Duration::from_secs(1));
        assert_eq!(config.io_timeout, Duration::from_secs(1));
        assert_eq!(config.exit_timeout, Duration::from_secs(1));
        assert!(config.allocate_port);
    }
}
