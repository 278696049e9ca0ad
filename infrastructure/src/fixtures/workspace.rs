//! Scratch directory holding the program under debug.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors preparing a test program
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Fixture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compiler command is empty")]
    EmptyCompiler,

    #[error("`{command}` failed ({status}):\n{stderr}")]
    CompileFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Compiler did not finish within {0:?}")]
    Timeout(Duration),
}

/// A temporary directory that is removed when dropped.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self, FixtureError> {
        let dir = tempfile::Builder::new().prefix("padre-harness").tempdir()?;
        debug!("Created test workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where a program named `name` lives: bare names resolve inside the
    /// workspace, anything with a path separator is used as given.
    pub fn program(&self, name: &str) -> PathBuf {
        if name.contains('/') {
            PathBuf::from(name)
        } else {
            self.path().join(name)
        }
    }

    /// Copy `source` into the workspace under its own file name.
    pub fn copy_file(&self, source: &Path) -> Result<PathBuf, FixtureError> {
        let name = source.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", source.display()),
            )
        })?;
        let target = self.path().join(name);
        std::fs::copy(source, &target)?;
        Ok(target)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf, FixtureError> {
        let target = self.path().join(name);
        std::fs::write(&target, contents)?;
        Ok(target)
    }

    /// Run `<compiler...> -o <output> <workspace>/<source>`.
    ///
    /// `output` resolves like [`program`](Self::program). `compiler` is
    /// split on whitespace, so it may carry flags (`"gcc -g -O0"`).
    pub async fn compile(
        &self,
        source: &str,
        compiler: &str,
        output: &str,
        timeout: Duration,
    ) -> Result<PathBuf, FixtureError> {
        let mut words = compiler.split_whitespace();
        let program = words.next().ok_or(FixtureError::EmptyCompiler)?;
        let output_path = self.program(output);
        let source_path = self.path().join(source);

        let mut cmd = Command::new(program);
        cmd.args(words)
            .arg("-o")
            .arg(&output_path)
            .arg(&source_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Compiling {} with {}", source, compiler);
        let result = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| FixtureError::Timeout(timeout))??;

        if !result.status.success() {
            return Err(FixtureError::CompileFailed {
                command: compiler.to_string(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        Ok(output_path)
    }
}
