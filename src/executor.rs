//! Async process executor.
//!
//! Runs the container engine binary (and, for the supervisor, the proxy
//! binaries) as child processes with timeout handling and stdin piping.
//! Archive transfers are binary, so stdout can be captured either as text
//! or as raw bytes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Default timeout applied to every command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Output of a completed command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the process
    pub exit_code: i32,
    /// Captured stdout bytes
    pub stdout: Vec<u8>,
    /// Captured stderr, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with code 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Decode stdout as UTF-8
    pub fn stdout_str(&self) -> Result<String> {
        String::from_utf8(self.stdout.clone()).map_err(|e| Error::utf8("command stdout", e))
    }
}

/// Async executor bound to one program
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Path to the program binary
    pub program: PathBuf,
    /// Timeout applied to each invocation (None for no timeout)
    pub timeout: Option<Duration>,
}

impl ProcessExecutor {
    /// Create an executor for the given program
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Create an executor for the `docker` binary found on the system
    pub fn docker() -> Result<Self> {
        Ok(Self::new(find_docker_binary()?))
    }

    /// Set the per-invocation timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the program and return its output, failing on non-zero exit
    pub async fn execute(&self, args: &[String]) -> Result<CommandOutput> {
        self.execute_with_stdin(args, None).await
    }

    /// Run the program with optional stdin bytes
    pub async fn execute_with_stdin(
        &self,
        args: &[String],
        stdin_data: Option<Vec<u8>>,
    ) -> Result<CommandOutput> {
        let command_str = format!("{} {}", self.program.display(), args.join(" "));
        debug!("executing: {command_str}");

        let mut command = Command::new(&self.program);
        command.args(args);
        command.stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| Error::io(format!("spawning {command_str}"), e))?;

        if let Some(data) = stdin_data {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(&data)
                    .await
                    .map_err(|e| Error::io(format!("writing stdin to {command_str}"), e))?;
                stdin
                    .shutdown()
                    .await
                    .map_err(|e| Error::io(format!("closing stdin of {command_str}"), e))?;
            }
        }

        let wait = child.wait_with_output();
        let output = if let Some(limit) = self.timeout {
            match timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => return Err(Error::command_timeout(command_str, limit)),
            }
        } else {
            wait.await
        }
        .map_err(|e| Error::io(format!("waiting for {command_str}"), e))?;

        let exit_code = output.status.code().unwrap_or(-1);
        trace!("completed with exit code {exit_code}");
        let result = CommandOutput {
            exit_code,
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            return Err(Error::command_failed(
                command_str,
                result.exit_code,
                result.stderr,
            ));
        }
        Ok(result)
    }

    /// Run the program and decode stdout as UTF-8 text
    pub async fn execute_text(&self, args: &[String]) -> Result<String> {
        self.execute(args).await?.stdout_str()
    }
}

/// Find the Docker binary in the system PATH
pub fn find_docker_binary() -> Result<PathBuf> {
    let possible_paths = [
        "docker",
        "/usr/bin/docker",
        "/usr/local/bin/docker",
        "/opt/docker/bin/docker",
    ];

    for path in &possible_paths {
        let path_buf = PathBuf::from(path);
        if path_buf.exists() || which::which(path).is_ok() {
            return Ok(path_buf);
        }
    }

    which::which("docker").map_err(|_| Error::engine_not_found("docker not found in PATH"))
}
