//! Builder for executing external tool commands with timeout and
//! cancellation support.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of trailing stderr lines kept for diagnostics.
const STDERR_TAIL_LINES: usize = 40;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8). For streamed runs this is only
    /// the trailing lines.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use wf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> wf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/path/to/clip.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Let the process run for as long as it needs.
    pub fn no_timeout(&mut self) -> &mut Self {
        self.timeout = None;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`wf_core::Error::Tool`] if spawning fails, the process times
    /// out, or it exits with a non-zero status (message includes stderr).
    pub async fn execute(&self) -> wf_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| wf_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    wf_core::Error::tool(&program_name, format!("timed out after {limit:?}"))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| {
            wf_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(wf_core::Error::tool(
                program_name,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    tool_output.stderr.trim()
                ),
            ));
        }

        Ok(tool_output)
    }

    /// Execute the command, feeding every stderr line to `on_line` as it
    /// arrives.
    ///
    /// Stdout is discarded. When `cancel` fires the child is killed and
    /// [`wf_core::Error::Cancelled`] is returned. A non-zero exit yields
    /// [`wf_core::Error::Tool`] carrying the exit status and the trailing
    /// stderr lines.
    pub async fn execute_with_stderr_callback<F>(
        &self,
        mut on_line: F,
        cancel: Option<CancellationToken>,
    ) -> wf_core::Result<ToolOutput>
    where
        F: FnMut(&str),
    {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| wf_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| wf_core::Error::tool(&program_name, "stderr was not captured"))?;
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = StderrTail::default();

        let cancel = cancel.unwrap_or_default();
        let deadline = async {
            match self.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        on_line(&line);
                        tail.push(line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(tool = %program_name, "stderr read failed: {e}");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    tracing::info!(tool = %program_name, "Killing process on cancellation");
                    let _ = child.kill().await;
                    return Err(wf_core::Error::Cancelled);
                }
                _ = &mut deadline => {
                    let _ = child.kill().await;
                    return Err(wf_core::Error::tool(
                        program_name,
                        format!("timed out after {:?}", self.timeout.unwrap_or_default()),
                    ));
                }
            }
        }

        let status = child.wait().await.map_err(|e| {
            wf_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;
        let stderr = tail.joined();

        if !status.success() {
            return Err(wf_core::Error::tool(
                program_name,
                format!("exited with status {status}: {}", stderr.trim()),
            ));
        }

        Ok(ToolOutput {
            status,
            stdout: String::new(),
            stderr,
        })
    }
}

/// Ring of the last [`STDERR_TAIL_LINES`] stderr lines.
#[derive(Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
}

impl StderrTail {
    fn push(&mut self, line: String) {
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}
