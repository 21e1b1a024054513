//! Builder for running an encoder process with cancellation support.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::progress::ProgressStream;
use crate::{Error, Result};

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// How long to keep reading stderr after the encoder exits. A background
/// child that inherited the pipe can hold it open indefinitely.
const STDERR_DRAIN_GRACE: Duration = Duration::from_secs(2);

type StderrTail = Arc<Mutex<VecDeque<String>>>;

/// A builder for constructing encoder invocations.
///
/// # Example
///
/// ```no_run
/// use clipforge_av::EncoderCommand;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> clipforge_av::Result<()> {
/// let cancel = CancellationToken::new();
/// EncoderCommand::new("ffmpeg")
///     .args(["-i", "in.webm", "-c:v", "libx264", "-y", "out.mp4"])
///     .niceness(Some(10))
///     .run(&cancel)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EncoderCommand {
    program: PathBuf,
    args: Vec<String>,
    niceness: Option<i32>,
}

impl EncoderCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            niceness: None,
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

    /// Run the program through `nice -n <value>` when set.
    pub fn niceness(&mut self, niceness: Option<i32>) -> &mut Self {
        self.niceness = niceness;
        self
    }

    /// Short tool name used in errors and logs.
    pub fn tool_name(&self) -> String {
        tool_name(&self.program)
    }

    fn build(&self, stdout: Stdio) -> Command {
        let mut cmd = match self.niceness {
            Some(n) => {
                let mut cmd = Command::new("nice");
                cmd.arg("-n").arg(n.to_string()).arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        };
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Spawn the encoder with stdout piped for progress parsing.
    pub fn spawn_with_progress(&self) -> Result<RunningEncoder> {
        self.spawn(Stdio::piped())
    }

    /// Spawn the encoder, run it to completion, and map the exit status.
    ///
    /// Cancelling the token kills the process and returns [`Error::Cancelled`].
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        self.spawn(Stdio::null())?.wait(cancel).await
    }

    fn spawn(&self, stdout: Stdio) -> Result<RunningEncoder> {
        let tool = self.tool_name();
        debug!("Spawning {} with args {:?}", tool, self.args);

        let mut child = self
            .build(stdout)
            .spawn()
            .map_err(|e| Error::spawn(tool.clone(), e))?;

        let stderr_tail: StderrTail =
            Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stderr_task = child.stderr.take().map(|stderr| {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let Ok(mut tail) = tail.lock() else { break };
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })
        });

        let stdout = child.stdout.take();

        Ok(RunningEncoder {
            child,
            tool,
            stdout,
            stderr_tail,
            stderr_task,
        })
    }
}

/// A spawned encoder process.
///
/// Dropping it kills the process; call [`RunningEncoder::wait`] to reap it.
pub struct RunningEncoder {
    child: Child,
    tool: String,
    stdout: Option<ChildStdout>,
    stderr_tail: StderrTail,
    stderr_task: Option<JoinHandle<()>>,
}

impl RunningEncoder {
    /// Take the progress stream over the process's stdout.
    ///
    /// Returns `None` if stdout was not piped or was already taken.
    pub fn take_progress(&mut self) -> Option<ProgressStream<BufReader<ChildStdout>>> {
        self.stdout
            .take()
            .map(|stdout| ProgressStream::new(BufReader::new(stdout)))
    }

    /// OS process id, if the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit, killing it if `cancel` fires first.
    ///
    /// A killed process is always reaped before this returns. Collecting
    /// the stderr tail after exit is bounded by a short grace period and by
    /// `cancel`.
    pub async fn wait(mut self, cancel: &CancellationToken) -> Result<()> {
        // Unread stdout must keep draining or the encoder blocks on a full pipe.
        if let Some(mut stdout) = self.stdout.take() {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await;
            });
        }

        let status = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill {}: {}", self.tool, e);
                }
                if let Some(task) = self.stderr_task.take() {
                    task.abort();
                }
                return Err(Error::Cancelled { tool: self.tool });
            }
            status = self.child.wait() => status?,
        };

        if let Some(mut task) = self.stderr_task.take() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    task.abort();
                    return Err(Error::Cancelled { tool: self.tool });
                }
                drained = tokio::time::timeout(STDERR_DRAIN_GRACE, &mut task) => {
                    if drained.is_err() {
                        debug!("{} exited but its stderr is still open, not waiting", self.tool);
                        task.abort();
                    }
                }
            }
        }
        let stderr = self
            .stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(Error::Exited {
                tool: self.tool,
                status,
                stderr,
            })
        }
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string())
}
