//! Argv-only process execution behind a command allowlist.
//!
//! [`ProcessGateway::exec_argv`] checks the requested program against the
//! gateway's [`CommandPolicy`], then spawns it directly with
//! [`tokio::process::Command`] (no shell is ever involved), an empty
//! environment plus the [`AllowedEnv`] variables, and piped stdio. Stdin is
//! fed while stdout/stderr are collected, so large inputs and outputs cannot
//! deadlock each other.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::capture::{self, Collected};
use super::env::AllowedEnv;
use super::invocation::{Captured, ProcessInvocation, ProcessOutput, StreamMode, Streams, TimeBudget};
use super::policy::CommandPolicy;
use super::sanitize::SanitizedText;

/// How long output pipes may stay open after the budget is spent before
/// the whole process group is killed and reading stops.
const PIPE_LINGER: Duration = Duration::from_millis(500);

/// Errors from the process gateway.
///
/// A nonzero exit status is not an error; it is reported in
/// [`ProcessOutput`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The program is not on the allowlist. Nothing was spawned.
    #[error("{command}: inaccessible or not found")]
    CommandNotAllowed { command: String },

    /// The OS refused to create the process (missing binary, permissions).
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Communicating with or waiting on the running process failed.
    #[error("I/O error while running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sanitized, merged text output of a time-bounded command.
#[derive(Debug, Clone)]
pub struct PlainOutput {
    pub text: SanitizedText,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub truncated: bool,
}

/// Spawns allow-listed programs by argument vector.
#[derive(Debug, Clone)]
pub struct ProcessGateway {
    policy: CommandPolicy,
    env: AllowedEnv,
}

impl ProcessGateway {
    pub fn new(policy: CommandPolicy, env: AllowedEnv) -> Self {
        Self { policy, env }
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    /// Run one invocation to completion.
    ///
    /// The allowlist check happens before anything else. The child is
    /// killed if the returned future is dropped.
    pub async fn exec_argv(
        &self,
        invocation: ProcessInvocation,
    ) -> Result<ProcessOutput, GatewayError> {
        self.policy.check(&invocation.command)?;

        tracing::info!(argv = ?invocation.argv_lossy(), "[shell] exec");

        let ProcessInvocation {
            command,
            args,
            stdin,
            encoding,
            streams,
            budget,
            max_capture_bytes,
        } = invocation;

        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .env_clear()
            .envs(self.env.iter())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so budget signals reach every descendant.
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| GatewayError::Spawn {
            command: command.clone(),
            source,
        })?;
        let pid = child.id();

        let stdin_pipe = child.stdin.take();
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(GatewayError::Io {
                command,
                source: std::io::Error::other("child stdio was not piped"),
            });
        };

        // `io_done` fires once both pipes reached EOF; `stop_reading` makes
        // the collectors return what they have.
        let io_done = CancellationToken::new();
        let stop_reading = CancellationToken::new();
        let io = async {
            let ((), collected) = tokio::join!(
                capture::feed(stdin_pipe, stdin, &command),
                collect(stdout, stderr, streams, max_capture_bytes, &stop_reading),
            );
            io_done.cancel();
            collected
        };
        let supervise = async {
            let waited = wait_with_budget(&mut child, budget, &command).await;
            let Some(budget) = budget else {
                return waited;
            };
            let (status, timed_out) = waited?;
            // Descendants may still hold the pipes after the child is gone.
            let linger = if timed_out {
                PIPE_LINGER
            } else {
                budget.limit.saturating_sub(start.elapsed()) + PIPE_LINGER
            };
            tokio::select! {
                _ = io_done.cancelled() => Ok((status, timed_out)),
                _ = tokio::time::sleep(linger) => {
                    tracing::warn!(command = %command, "Output pipes still open after exit, killing process group");
                    signal_group(pid, libc::SIGKILL);
                    stop_reading.cancel();
                    Ok((status, true))
                }
            }
        };
        let (collected, waited) = tokio::join!(io, supervise);

        let io_error = |source| GatewayError::Io {
            command: command.clone(),
            source,
        };
        let (status, timed_out) = waited.map_err(io_error)?;
        let (streams, truncated) = collected.map_err(io_error)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let streams = match streams {
            CollectedStreams::Merged(all) => Streams::Merged(Captured::decode(all, encoding)),
            CollectedStreams::Split { stdout, stderr } => Streams::Split {
                stdout: Captured::decode(stdout, encoding),
                stderr: Captured::decode(stderr, encoding),
            },
        };

        let output = ProcessOutput {
            streams,
            exit_code: status.code(),
            signal: exit_signal(&status),
            timed_out,
            truncated,
            duration_ms,
        };

        tracing::debug!(
            command = %command,
            exit_code = ?output.exit_code,
            signal = ?output.signal,
            timed_out,
            truncated,
            duration_ms,
            "[shell] exited",
        );

        Ok(output)
    }

    /// Run `argv` under `budget`, merge both streams as UTF-8 and strip
    /// terminal control sequences.
    ///
    /// An empty `argv` is rejected by the allowlist like any unknown name.
    pub async fn exec_plain(
        &self,
        argv: &[String],
        budget: TimeBudget,
    ) -> Result<PlainOutput, GatewayError> {
        let (command, args) = argv.split_first().map_or(("", &[][..]), |(c, a)| (c.as_str(), a));
        let output = self
            .exec_argv(
                ProcessInvocation::new(command)
                    .args(args)
                    .time_bounded(budget),
            )
            .await?;

        let text = SanitizedText::new(&output.stdout().text_lossy());
        Ok(PlainOutput {
            text,
            exit_code: output.exit_code,
            timed_out: output.timed_out,
            truncated: output.truncated,
        })
    }
}

enum CollectedStreams {
    Merged(Vec<u8>),
    Split { stdout: Vec<u8>, stderr: Vec<u8> },
}

async fn collect<O, E>(
    stdout: O,
    stderr: E,
    mode: StreamMode,
    cap: usize,
    stop: &CancellationToken,
) -> std::io::Result<(CollectedStreams, bool)>
where
    O: tokio::io::AsyncRead + Unpin,
    E: tokio::io::AsyncRead + Unpin,
{
    match mode {
        StreamMode::Merged => {
            let Collected { bytes, truncated } = capture::drain_merged(stdout, stderr, cap, stop).await?;
            Ok((CollectedStreams::Merged(bytes), truncated))
        }
        StreamMode::Split => {
            let (out, err) = tokio::try_join!(
                capture::drain(stdout, cap, stop),
                capture::drain(stderr, cap, stop)
            )?;
            let truncated = out.truncated || err.truncated;
            Ok((
                CollectedStreams::Split {
                    stdout: out.bytes,
                    stderr: err.bytes,
                },
                truncated,
            ))
        }
    }
}

/// Wait for `child`, enforcing `budget` when present.
///
/// On expiry the child's process group gets SIGTERM, then SIGKILL once the
/// grace period has also run out. Returns the exit status and whether the
/// budget expired.
async fn wait_with_budget(
    child: &mut Child,
    budget: Option<TimeBudget>,
    command: &str,
) -> std::io::Result<(ExitStatus, bool)> {
    let Some(budget) = budget else {
        return Ok((child.wait().await?, false));
    };

    if let Ok(status) = tokio::time::timeout(budget.limit, child.wait()).await {
        return Ok((status?, false));
    }

    tracing::warn!(
        command,
        limit_secs = budget.limit.as_secs_f64(),
        "Time budget exceeded, sending SIGTERM"
    );
    let pid = child.id();
    signal_group(pid, libc::SIGTERM);

    if let Ok(status) = tokio::time::timeout(budget.grace, child.wait()).await {
        // The leader may exit on TERM while descendants ignore it.
        signal_group(pid, libc::SIGKILL);
        return Ok((status?, true));
    }

    tracing::warn!(command, "Process ignored SIGTERM, killing");
    signal_group(pid, libc::SIGKILL);
    child.start_kill()?;
    Ok((child.wait().await?, true))
}

/// Send `signal` to the process group led by `pid`.
fn signal_group(pid: Option<u32>, signal: libc::c_int) {
    let Some(pid) = pid else {
        return;
    };
    // SAFETY: `kill` has no memory-safety preconditions. The group was
    // created for this child and outlives it only while members remain.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: every member has already exited.
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pid, signal, error = %err, "Failed to signal process group");
        }
    }
}

fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}
