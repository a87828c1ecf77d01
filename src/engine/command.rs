//! Builder for executing external tool commands.
//!
//! Every child process is spawned with `kill_on_drop`, so dropping the future
//! that awaits it (timeout, task abort, Ctrl-C) also terminates the process.

use crate::error::{ConvertError, Result};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a successful tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// A builder for constructing and executing external tool invocations
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stdin_data: Option<Vec<u8>>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin_data: None,
        }
    }

    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl AsRef<OsStr>>) -> &mut Self {
        self.args
            .extend(iter.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Provide data to be written to the process's stdin
    pub fn stdin(&mut self, data: &[u8]) -> &mut Self {
        self.stdin_data = Some(data.to_vec());
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// A non-zero exit status is reported as [`ConvertError::Engine`] with
    /// the tool's stderr.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();
        debug!("Running {} {:?}", program_name, self.args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(if self.stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ConvertError::engine(&program_name, format!("failed to spawn: {e}")))?;

        // Feed stdin concurrently with draining stdout, a large image would
        // otherwise fill the pipe and deadlock both sides.
        let stdin_pipe = child.stdin.take();
        let stdin_data = self.stdin_data.as_deref();
        let feed = async move {
            if let (Some(mut pipe), Some(data)) = (stdin_pipe, stdin_data) {
                pipe.write_all(data).await?;
                pipe.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| {
            ConvertError::engine(&program_name, format!("I/O error waiting for process: {e}"))
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(ConvertError::engine(
                program_name,
                format!("exited with status {}: {}", output.status, stderr),
            ));
        }
        if let Err(e) = fed {
            return Err(ConvertError::engine(
                program_name,
                format!("failed to write stdin: {e}"),
            ));
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipes_stdin_to_stdout() {
        let output = ToolCommand::new("cat").stdin(b"hello").execute().await.unwrap();
        assert_eq!(output.stdout, b"hello");
    }

    #[tokio::test]
    async fn nonexistent_tool_is_engine_error() {
        let result = ToolCommand::new("nonexistent_tool_xyz_12345").execute().await;
        assert!(matches!(result, Err(ConvertError::Engine { .. })));
    }

    #[tokio::test]
    async fn non_zero_exit_is_engine_error() {
        let result = ToolCommand::new("false").execute().await;
        match result {
            Err(ConvertError::Engine { tool, message }) => {
                assert_eq!(tool, "false");
                assert!(message.contains("exited with status"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
