//! Debugger server supervisor
//!
//! Spawns the server, checks its startup banner, keeps its standard output
//! drained in the background, tracks every process it spawns and verifies
//! that all of them are gone after shutdown.

use super::error::SupervisorError;
use super::table;
use async_trait::async_trait;
use harness_application::{DebuggerProcess, ProcessError, ShutdownPolicy};
use harness_domain::{LaunchSpec, ProcessState, ProcessTree};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Supervises one debugger server process.
///
/// The stdout drain task runs on the runtime `handle` given at construction
/// and is stopped when the server is reaped or the supervisor is dropped.
/// The child itself is killed on drop.
pub struct ProcessSupervisor {
    handle: Handle,
    state: ProcessState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    tree: ProcessTree,
    exit_code: Option<Option<i32>>,
    cancel: CancellationToken,
    drain: Option<JoinHandle<()>>,
    reap_timeout: Duration,
}

impl ProcessSupervisor {
    pub fn new(handle: Handle, reap_timeout: Duration) -> Self {
        Self {
            handle,
            state: ProcessState::NotStarted,
            child: None,
            stdin: None,
            tree: ProcessTree::default(),
            exit_code: None,
            cancel: CancellationToken::new(),
            drain: None,
            reap_timeout,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.tree.root()
    }

    pub fn tree(&self) -> &ProcessTree {
        &self.tree
    }

    /// Exit code once the server has been reaped; `Some(None)` if it died
    /// from a signal.
    pub fn exit_code(&self) -> Option<Option<i32>> {
        self.exit_code
    }

    fn transition(&mut self, next: ProcessState) -> Result<(), SupervisorError> {
        if !self.state.can_transition_to(next) {
            return Err(SupervisorError::InvalidState {
                from: self.state,
                to: next,
            });
        }
        trace!("Debugger server state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Spawn the server and wait for its startup banner.
    ///
    /// Returns the port the server announced. If the banner is wrong or
    /// never arrives the server is left running in `Starting`; the caller
    /// reaps it with [`kill`](Self::kill).
    pub async fn start(&mut self, spec: &LaunchSpec, timeout: Duration) -> Result<u16, SupervisorError> {
        self.transition(ProcessState::Starting)?;

        let args = spec.args();
        debug!(
            "Spawning debugger server: {} {}",
            spec.executable.display(),
            args.join(" ")
        );

        let mut cmd = Command::new(&spec.executable);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        // Linux: request kernel to send SIGTERM to child when parent dies.
        // This catches cases where Drop doesn't run (SIGKILL, OOM kill).
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(SupervisorError::Spawn)?;
        let pid = child.id().ok_or(SupervisorError::NotStarted)?;
        self.tree = ProcessTree::new(pid);
        self.stdin = child.stdin.take();
        let stdout = child.stdout.take();
        self.child = Some(child);

        let stdout = stdout.ok_or_else(|| {
            SupervisorError::Spawn(std::io::Error::other("Failed to capture stdout"))
        })?;

        match self.read_banner(stdout, spec, timeout).await {
            Ok(port) => {
                self.transition(ProcessState::Running)?;
                info!("Debugger server {} listening on port {}", pid, port);
                Ok(port)
            }
            Err(e) => {
                warn!("Debugger server {} failed to start: {}", pid, e);
                Err(e)
            }
        }
    }

    async fn read_banner(
        &mut self,
        stdout: ChildStdout,
        spec: &LaunchSpec,
        timeout: Duration,
    ) -> Result<u16, SupervisorError> {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();

        tokio::time::timeout(timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| SupervisorError::Timeout(timeout))??;
        debug!("Debugger server output: {}", line.trim_end());

        let port = spec.listen.check_banner(&line)?;
        self.spawn_drain(reader);
        Ok(port)
    }

    /// Keep reading stdout so the server never blocks on a full pipe.
    fn spawn_drain(&mut self, reader: BufReader<ChildStdout>) {
        let cancel = self.cancel.clone();
        let mut lines = reader.lines();

        self.drain = Some(self.handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => trace!("server stdout: {}", line),
                        Ok(None) => break,
                        Err(e) => {
                            debug!("Stopped reading server stdout: {}", e);
                            break;
                        }
                    },
                }
            }
        }));
    }

    async fn stop_drain(&mut self) {
        self.cancel.cancel();
        if let Some(drain) = self.drain.take() {
            let _ = drain.await;
        }
    }

    /// Record every live descendant of the server. Returns how many pids
    /// were new.
    pub async fn track_descendants(&mut self) -> Result<usize, SupervisorError> {
        if self.tree.root().is_none() {
            return Err(SupervisorError::NotStarted);
        }
        let snapshot = self
            .handle
            .spawn_blocking(table::snapshot)
            .await
            .map_err(|e| SupervisorError::Io(std::io::Error::other(e)))?;
        Ok(self.tree.track(snapshot))
    }

    /// Write `line` plus a newline to the server's standard input.
    pub async fn send_line(&mut self, line: &str, timeout: Duration) -> Result<(), SupervisorError> {
        let stdin = self.stdin.as_mut().ok_or(SupervisorError::NotStarted)?;
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };

        tokio::time::timeout(timeout, write)
            .await
            .map_err(|_| SupervisorError::Timeout(timeout))??;
        trace!("Wrote {} bytes to server stdin", line.len() + 1);
        Ok(())
    }

    /// Send the interrupt signal that asks the server to shut down.
    pub async fn terminate(&mut self) -> Result<(), SupervisorError> {
        let pid = self.pid().ok_or(SupervisorError::NotStarted)?;
        self.transition(ProcessState::Terminating)?;

        debug!("Sending SIGINT to debugger server {}", pid);
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(SupervisorError::Signal { pid, source }),
        }
    }

    fn try_reap(&mut self) -> Result<Option<Option<i32>>, SupervisorError> {
        if self.exit_code.is_none()
            && let Some(child) = self.child.as_mut()
            && let Some(status) = child.try_wait()?
        {
            debug!("Debugger server exited: {}", status);
            self.exit_code = Some(status.code());
        }
        Ok(self.exit_code)
    }

    async fn finish(&mut self) {
        self.stop_drain().await;
        self.stdin = None;
        self.state = ProcessState::Terminated;
    }

    /// Wait up to `timeout` for the server to exit.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> Result<Option<i32>, SupervisorError> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        let child = self.child.as_mut().ok_or(SupervisorError::NotStarted)?;
        let status = tokio::time::timeout(timeout, child.wait())
            .await
            .map_err(|_| SupervisorError::Timeout(timeout))??;

        self.exit_code = Some(status.code());
        self.finish().await;
        Ok(status.code())
    }

    /// Poll until the server has exited and no tracked process is alive,
    /// then check the exit code.
    ///
    /// Fails with `Timeout` if the server never exits within the polling
    /// window, `ProcessLeak` if it exits but descendants survive, and
    /// `UnexpectedExitCode` otherwise on a wrong code.
    pub async fn assert_fully_stopped(&mut self, policy: &ShutdownPolicy) -> Result<(), SupervisorError> {
        if self.child.is_none() {
            return Err(SupervisorError::NotStarted);
        }

        let mut survivors = Vec::new();
        for attempt in 0..=policy.poll_retries {
            if self.try_reap()?.is_some() {
                let live = self
                    .handle
                    .spawn_blocking(table::live_pids)
                    .await
                    .map_err(|e| SupervisorError::Io(std::io::Error::other(e)))?;
                survivors = self.tree.survivors(&live);
                if survivors.is_empty() {
                    break;
                }
            }
            if attempt < policy.poll_retries {
                tokio::time::sleep(policy.poll_interval).await;
            }
        }

        let Some(code) = self.exit_code else {
            return Err(SupervisorError::Timeout(policy.window()));
        };
        self.finish().await;

        if !survivors.is_empty() {
            warn!("Processes survived shutdown: {:?}", survivors);
            return Err(SupervisorError::ProcessLeak { pids: survivors });
        }
        if code != Some(policy.expected_exit_code) {
            return Err(SupervisorError::UnexpectedExitCode {
                expected: policy.expected_exit_code,
                actual: code,
            });
        }

        info!(
            "Debugger server and {} descendant(s) stopped",
            self.tree.descendants().len()
        );
        Ok(())
    }

    /// SIGKILL every tracked descendant and the server, then reap it.
    pub async fn kill(&mut self) -> Result<(), SupervisorError> {
        if self.exit_code.is_none()
            && let Err(e) = self.track_descendants().await
        {
            debug!("Could not refresh process tree before kill: {}", e);
        }

        for pid in self.tree.descendants().iter().copied() {
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => debug!("Killed process {}", pid),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!("Failed to kill process {}: {}", pid, e),
            }
        }

        if self.exit_code.is_none()
            && let Some(child) = self.child.as_mut()
        {
            child.start_kill()?;
            let status = tokio::time::timeout(self.reap_timeout, child.wait())
                .await
                .map_err(|_| SupervisorError::Timeout(self.reap_timeout))??;
            self.exit_code = Some(status.code());
        }

        self.finish().await;
        Ok(())
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl DebuggerProcess for ProcessSupervisor {
    fn state(&self) -> ProcessState {
        self.state
    }

    fn pid(&self) -> Option<u32> {
        self.tree.root()
    }

    fn tree(&self) -> &ProcessTree {
        &self.tree
    }

    async fn start(&mut self, spec: &LaunchSpec, timeout: Duration) -> Result<u16, ProcessError> {
        ProcessSupervisor::start(self, spec, timeout)
            .await
            .map_err(Into::into)
    }

    async fn track_descendants(&mut self) -> Result<usize, ProcessError> {
        ProcessSupervisor::track_descendants(self)
            .await
            .map_err(Into::into)
    }

    async fn send_line(&mut self, line: &str, timeout: Duration) -> Result<(), ProcessError> {
        ProcessSupervisor::send_line(self, line, timeout)
            .await
            .map_err(Into::into)
    }

    async fn terminate(&mut self) -> Result<(), ProcessError> {
        ProcessSupervisor::terminate(self).await.map_err(Into::into)
    }

    async fn wait_for_exit(&mut self, timeout: Duration) -> Result<Option<i32>, ProcessError> {
        ProcessSupervisor::wait_for_exit(self, timeout)
            .await
            .map_err(Into::into)
    }

    async fn assert_fully_stopped(&mut self, policy: &ShutdownPolicy) -> Result<(), ProcessError> {
        ProcessSupervisor::assert_fully_stopped(self, policy)
            .await
            .map_err(Into::into)
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        ProcessSupervisor::kill(self).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_domain::{LaunchError, ListenAddress};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const WINDOW: Duration = Duration::from_secs(5);

    /// Parses `--host`/`--port`, forks a `sleep` child, prints the banner
    /// and waits. `$ON_INT` runs when SIGINT arrives.
    fn stub_server(dir: &Path, name: &str, banner: &str, on_int: &str) -> PathBuf {
        let script = format!(
            r#"#!/bin/sh
host=127.0.0.1
port=9999
for arg in "$@"; do
  case "$arg" in
    --host=*) host="${{arg#--host=}}" ;;
    --port=*) port="${{arg#--port=}}" ;;
  esac
done
sleep 30 &
child=$!
trap '{on_int}' INT
echo "{banner}"
wait $child
"#
        );
        let path = dir.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn well_behaved(dir: &Path) -> PathBuf {
        stub_server(
            dir,
            "padre",
            "Listening on $host:$port",
            "kill $child; wait $child; exit 0",
        )
    }

    fn spec(executable: PathBuf, port: Option<u16>) -> LaunchSpec {
        LaunchSpec::new(executable, "test_prog").with_listen(ListenAddress::new("127.0.0.1", port))
    }

    fn supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(Handle::current(), WINDOW)
    }

    fn policy() -> ShutdownPolicy {
        ShutdownPolicy {
            expected_exit_code: 0,
            poll_interval: Duration::from_millis(50),
            poll_retries: 40,
        }
    }

    #[tokio::test]
    async fn test_start_with_fixed_port() {
        let dir = TempDir::new().unwrap();
        let mut supervisor = supervisor();

        let port = supervisor
            .start(&spec(well_behaved(dir.path()), Some(9999)), WINDOW)
            .await
            .unwrap();
        assert_eq!(port, 9999);
        assert_eq!(supervisor.state(), ProcessState::Running);
        assert!(supervisor.pid().is_some());

        supervisor.kill().await.unwrap();
        assert_eq!(supervisor.state(), ProcessState::Terminated);
    }

    #[tokio::test]
    async fn test_start_discovers_port_from_banner() {
        let dir = TempDir::new().unwrap();
        let mut supervisor = supervisor();

        let port = supervisor
            .start(&spec(well_behaved(dir.path()), None), WINDOW)
            .await
            .unwrap();
        assert_eq!(port, 9999);
        supervisor.kill().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_banner_fails_startup() {
        let dir = TempDir::new().unwrap();
        let executable = stub_server(
            dir.path(),
            "padre",
            "Listening on 127.0.0.1:1234",
            "exit 0",
        );
        let mut supervisor = supervisor();

        let err = supervisor
            .start(&spec(executable, Some(9999)), WINDOW)
            .await
            .unwrap_err();
        match err {
            SupervisorError::StartupProtocolViolation(LaunchError::StartupProtocolViolation {
                expected,
                actual,
            }) => {
                assert_eq!(expected, "Listening on 127.0.0.1:9999\n");
                assert_eq!(actual, "Listening on 127.0.0.1:1234\n");
            }
            other => panic!("expected StartupProtocolViolation, got {other:?}"),
        }
        assert_eq!(supervisor.state(), ProcessState::Starting);
        let pid = supervisor.pid().unwrap();
        assert!(table::live_pids().contains(&pid));

        supervisor.kill().await.unwrap();
        assert_eq!(supervisor.state(), ProcessState::Terminated);
        assert!(!table::live_pids().contains(&pid));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("silent");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut supervisor = supervisor();

        let err = supervisor
            .start(&spec(path, Some(9999)), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Timeout(_)));
        assert_eq!(supervisor.state(), ProcessState::Starting);
        let pid = supervisor.pid().unwrap();
        assert!(table::live_pids().contains(&pid));

        supervisor.kill().await.unwrap();
        assert_eq!(supervisor.state(), ProcessState::Terminated);
        assert!(!table::live_pids().contains(&pid));
    }

    #[tokio::test]
    async fn test_graceful_shutdown_stops_whole_tree() {
        let dir = TempDir::new().unwrap();
        let mut supervisor = supervisor();
        supervisor
            .start(&spec(well_behaved(dir.path()), Some(9999)), WINDOW)
            .await
            .unwrap();

        let added = supervisor.track_descendants().await.unwrap();
        assert!(added >= 1, "sleep child not tracked");
        // Tracking again adds nothing new
        assert_eq!(supervisor.track_descendants().await.unwrap(), 0);

        supervisor.terminate().await.unwrap();
        assert_eq!(supervisor.state(), ProcessState::Terminating);
        supervisor.assert_fully_stopped(&policy()).await.unwrap();

        assert_eq!(supervisor.state(), ProcessState::Terminated);
        assert_eq!(supervisor.exit_code(), Some(Some(0)));
        let live = table::live_pids();
        assert!(supervisor.tree().survivors(&live).is_empty());
    }

    #[tokio::test]
    async fn test_leaked_descendant_is_reported() {
        let dir = TempDir::new().unwrap();
        let executable = stub_server(dir.path(), "padre", "Listening on $host:$port", "exit 0");
        let mut supervisor = supervisor();
        supervisor
            .start(&spec(executable, Some(9999)), WINDOW)
            .await
            .unwrap();
        supervisor.track_descendants().await.unwrap();
        let child = *supervisor.tree().descendants().iter().next().unwrap();

        supervisor.terminate().await.unwrap();
        let err = supervisor.assert_fully_stopped(&policy()).await.unwrap_err();
        match &err {
            SupervisorError::ProcessLeak { pids } => assert!(pids.contains(&child)),
            other => panic!("expected ProcessLeak, got {other:?}"),
        }
        assert!(ProcessError::from(err).is_leak());

        supervisor.kill().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!table::live_pids().contains(&child));
    }

    #[tokio::test]
    async fn test_unexpected_exit_code() {
        let dir = TempDir::new().unwrap();
        let executable = stub_server(
            dir.path(),
            "padre",
            "Listening on $host:$port",
            "kill $child; wait $child; exit 3",
        );
        let mut supervisor = supervisor();
        supervisor
            .start(&spec(executable, Some(9999)), WINDOW)
            .await
            .unwrap();

        supervisor.terminate().await.unwrap();
        let err = supervisor.assert_fully_stopped(&policy()).await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::UnexpectedExitCode {
                expected: 0,
                actual: Some(3)
            }
        ));
    }

    #[tokio::test]
    async fn test_terminal_input_reaches_stdin() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("stdin.log");
        let path = dir.path().join("echo");
        let script = format!(
            "#!/bin/sh\necho \"Listening on 127.0.0.1:9999\"\nread -r line\nprintf '%s\\n' \"$line\" > {}\n",
            out.display()
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut supervisor = supervisor();
        supervisor
            .start(&spec(path, Some(9999)), WINDOW)
            .await
            .unwrap();

        supervisor.send_line("bt", WINDOW).await.unwrap();
        assert_eq!(supervisor.wait_for_exit(WINDOW).await.unwrap(), Some(0));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "bt\n");
        assert_eq!(supervisor.state(), ProcessState::Terminated);
    }

    #[tokio::test]
    async fn test_terminate_before_start() {
        let mut supervisor = supervisor();
        assert!(matches!(
            supervisor.terminate().await,
            Err(SupervisorError::NotStarted)
        ));
        assert!(matches!(
            supervisor.track_descendants().await,
            Err(SupervisorError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut supervisor = supervisor();
        let spec = spec(well_behaved(dir.path()), Some(9999));
        supervisor.start(&spec, WINDOW).await.unwrap();

        let err = supervisor.start(&spec, WINDOW).await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::InvalidState {
                from: ProcessState::Running,
                to: ProcessState::Starting
            }
        ));
        supervisor.kill().await.unwrap();
    }
}
