//! Subprocess invocation of an AI coding agent.
//!
//! Grounded on `cortex-engine::process_utils` (status/signal vocabulary)
//! and `cortex-engine::terminal::process::BackgroundTerminal` (streamed
//! output capture, SIGINT-then-SIGKILL shutdown), adapted from a
//! persistent interactive terminal into a single bounded invocation:
//! spawn once, stream both pipes into a shared tail buffer, and resolve
//! to exactly one outcome (clean exit, timeout, or cancellation).

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::tail::TailBuffer;

/// Default number of tail bytes retained for retry-context injection.
pub const DEFAULT_TAIL_CAPACITY: usize = 8 * 1024;

/// Grace period after a SIGINT/cancellation before a hard kill, per
/// spec.md §6's "hard deadline (~2s) forces termination".
pub const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Why the invocation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The process exited on its own (exit code may still be non-zero).
    CleanExit,
    /// The per-invocation timeout elapsed.
    Timeout,
    /// The caller's cancellation token fired (user interrupt or run-level cancel).
    Cancelled,
}

/// One fully-resolved agent invocation.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub exit_code: Option<i32>,
    pub tail: String,
    pub duration: Duration,
    pub reason: StopReason,
}

impl AgentOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.reason, StopReason::CleanExit) && self.exit_code == Some(0)
    }
}

/// A single agent invocation request.
pub struct AgentInvocation {
    /// Fully rendered shell command (the `{{PROMPT}}` template already substituted).
    pub command: String,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
    /// Zero means no timeout.
    pub timeout: Duration,
    /// Inherit the parent's stdio instead of piping, for interactive stages.
    pub inherit_tty: bool,
    pub tail_capacity: usize,
}

impl AgentInvocation {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            env: Vec::new(),
            timeout: Duration::ZERO,
            inherit_tty: false,
            tail_capacity: DEFAULT_TAIL_CAPACITY,
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_inherit_tty(mut self, inherit: bool) -> Self {
        self.inherit_tty = inherit;
        self
    }
}

/// Runs a single agent invocation to completion.
pub struct AgentInvoker;

impl AgentInvoker {
    pub fn new() -> Self {
        Self
    }

    /// Run the invocation, returning once the process has exited, timed
    /// out, or been cancelled. `cancel` defaults to a token that never
    /// fires if the caller has no cancellation source.
    pub async fn run(&self, invocation: AgentInvocation, cancel: CancellationToken) -> Result<AgentOutcome> {
        let start = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&invocation.command)
            .current_dir(&invocation.working_dir)
            .kill_on_drop(true);

        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        if invocation.inherit_tty {
            cmd.stdin(Stdio::inherit());
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null());
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            command: invocation.command.clone(),
            source,
        })?;

        let tail = Arc::new(Mutex::new(TailBuffer::new(invocation.tail_capacity)));

        let mut stream_tasks = Vec::new();
        if !invocation.inherit_tty {
            if let Some(stdout) = child.stdout.take() {
                stream_tasks.push(spawn_drain(stdout, tail.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                stream_tasks.push(spawn_drain(stderr, tail.clone()));
            }
        }

        let pid = child.id();
        let timeout_fut = async {
            if invocation.timeout.is_zero() {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(invocation.timeout).await;
            }
        };

        let reason;
        let exit_code;
        tokio::select! {
            wait_result = child.wait() => {
                reason = StopReason::CleanExit;
                exit_code = wait_result.map_err(AgentError::Wait)?.code();
            }
            _ = timeout_fut => {
                reason = StopReason::Timeout;
                exit_code = terminate(&mut child, pid).await;
            }
            _ = cancel.cancelled() => {
                reason = StopReason::Cancelled;
                exit_code = terminate(&mut child, pid).await;
            }
        }

        for task in stream_tasks {
            let _ = task.await;
        }

        let tail_text = tail.lock().await.as_string();

        tracing::debug!(
            command = %invocation.command,
            exit_code = ?exit_code,
            reason = ?reason,
            duration_ms = start.elapsed().as_millis(),
            "agent invocation finished"
        );

        Ok(AgentOutcome {
            exit_code,
            tail: tail_text,
            duration: start.elapsed(),
            reason,
        })
    }
}

impl Default for AgentInvoker {
    fn default() -> Self {
        Self::new()
    }
}

/// SIGINT the process group, give it `CANCEL_GRACE_PERIOD` to exit, then
/// SIGKILL. On non-Unix targets this falls back to an immediate kill.
async fn terminate(child: &mut tokio::process::Child, pid: Option<u32>) -> Option<i32> {
    #[cfg(unix)]
    if let Some(pid) = pid {
        unsafe {
            libc::kill(-(pid as i32), libc::SIGINT);
        }
        let grace = tokio::time::sleep(CANCEL_GRACE_PERIOD);
        tokio::select! {
            result = child.wait() => return result.ok().and_then(|s| s.code()),
            _ = grace => {}
        }
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }

    #[cfg(not(unix))]
    let _ = pid;

    child.wait().await.ok().and_then(|s| s.code())
}

fn spawn_drain<R>(mut reader: R, tail: Arc<Mutex<TailBuffer>>) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.lock().await.push(&buf[..n]);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clean_exit_captures_tail_and_exit_code() {
        let invoker = AgentInvoker::new();
        let invocation = AgentInvocation::new("echo hello-from-agent", std::env::temp_dir());
        let outcome = invoker.run(invocation, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.reason, StopReason::CleanExit);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.tail.contains("hello-from-agent"));
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_success() {
        let invoker = AgentInvoker::new();
        let invocation = AgentInvocation::new("exit 7", std::env::temp_dir());
        let outcome = invoker.run(invocation, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.exit_code, Some(7));
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn timeout_is_reported_as_the_stop_reason() {
        let invoker = AgentInvoker::new();
        let invocation =
            AgentInvocation::new("sleep 10", std::env::temp_dir()).with_timeout(Duration::from_millis(50));
        let outcome = invoker.run(invocation, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.reason, StopReason::Timeout);
    }

    #[tokio::test]
    async fn cancellation_token_stops_the_process() {
        let invoker = AgentInvoker::new();
        let cancel = CancellationToken::new();
        let invocation = AgentInvocation::new("sleep 10", std::env::temp_dir());

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let outcome = invoker.run(invocation, cancel).await.unwrap();
        assert_eq!(outcome.reason, StopReason::Cancelled);
    }
}
