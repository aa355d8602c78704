use std::{
    ffi::OsStr,
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    process::{Child, Command},
    sync::{OwnedSemaphorePermit, Semaphore},
};

use crate::{error_code::ErrorCode, future::WithTimeout};

struct MetricsGuard {
    start: Instant,
    armed: bool,
    command: String,
}

impl MetricsGuard {
    fn guard(command: String) -> Self {
        metrics::counter!("vod.process.start", "command" => command.clone()).increment(1);

        Self {
            start: Instant::now(),
            armed: true,
            command,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for MetricsGuard {
    fn drop(&mut self) {
        metrics::histogram!(
            "vod.process.duration",
            "command" => self.command.clone(),
            "completed" => (!self.armed).to_string()
        )
        .record(self.start.elapsed().as_secs_f64());

        metrics::counter!(
            "vod.process.end",
            "completed" => (!self.armed).to_string(),
            "command" => self.command.clone()
        )
        .increment(1);
    }
}

/// Bounds how many external processes may run at once across the whole service
#[derive(Clone, Debug)]
pub(crate) struct ProcessLimiter {
    semaphore: Arc<Semaphore>,
}

impl ProcessLimiter {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
        }
    }

    pub(crate) fn default_permits() -> usize {
        num_cpus::get().saturating_sub(1).max(1)
    }

    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

pub(crate) struct Process {
    command: String,
    child: Child,
    guard: MetricsGuard,
    deadline: Instant,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("command", &self.command)
            .field("child", &"Child")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProcessError {
    #[error("Required command {0} not found, make sure it exists in vod-rs' $PATH")]
    NotFound(String),

    #[error("Cannot run command {0} due to invalid permissions on binary, make sure the vod-rs user has permission to run it")]
    PermissionDenied(String),

    #[error("Reached process spawn limit")]
    LimitReached,

    #[error("Failed to spawn {0}")]
    Spawn(String, #[source] std::io::Error),

    #[error("Failed writing input to {0}")]
    Write(String, #[source] std::io::Error),

    #[error("Failed reading output from {0}")]
    Read(String, #[source] std::io::Error),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0} Failed with {1}")]
    Status(String, ExitStatus),

    #[error("Unknown process error")]
    Other(#[source] std::io::Error),
}

impl ProcessError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::COMMAND_NOT_FOUND,
            Self::PermissionDenied(_) => ErrorCode::COMMAND_PERMISSION_DENIED,
            Self::LimitReached => ErrorCode::PROCESS_SEMAPHORE_CLOSED,
            Self::Spawn(_, _) | Self::Other(_) => ErrorCode::COMMAND_ERROR,
            Self::Write(_, _) | Self::Read(_, _) => ErrorCode::COMMAND_IO_ERROR,
            Self::Timeout(_) => ErrorCode::COMMAND_TIMEOUT,
            Self::Status(_, _) => ErrorCode::COMMAND_FAILURE,
        }
    }

    /// The external program rejected its input
    pub(crate) const fn is_client_error(&self) -> bool {
        matches!(self, Self::Status(_, _))
    }
}

impl Process {
    /// Wait for a slot from the limiter, then spawn `command`
    ///
    /// Time spent waiting for the limiter counts against `timeout`.
    pub(crate) async fn run<T>(
        command: &str,
        args: &[T],
        limiter: &ProcessLimiter,
        timeout: Duration,
    ) -> Result<Self, ProcessError>
    where
        T: AsRef<OsStr>,
    {
        let deadline = Instant::now() + timeout;

        if limiter.available() == 0 {
            tracing::debug!("Waiting for a process slot for {command}");
        }

        let permit = match limiter
            .semaphore
            .clone()
            .acquire_owned()
            .with_timeout(timeout)
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ProcessError::LimitReached),
            Err(_) => return Err(ProcessError::Timeout(command.to_string())),
        };

        let res = tracing::trace_span!(parent: None, "Create command", %command).in_scope(|| {
            Self::spawn(command, Command::new(command).args(args), deadline, permit)
        });

        match res {
            Ok(this) => Ok(this),
            Err(e) => match e.kind() {
                std::io::ErrorKind::NotFound => Err(ProcessError::NotFound(command.to_string())),
                std::io::ErrorKind::PermissionDenied => {
                    Err(ProcessError::PermissionDenied(command.to_string()))
                }
                std::io::ErrorKind::WouldBlock => Err(ProcessError::LimitReached),
                _ => Err(ProcessError::Spawn(command.to_string(), e)),
            },
        }
    }

    fn spawn(
        command: &str,
        cmd: &mut Command,
        deadline: Instant,
        permit: OwnedSemaphorePermit,
    ) -> std::io::Result<Self> {
        tracing::trace_span!(parent: None, "Spawn command", %command).in_scope(|| {
            let guard = MetricsGuard::guard(command.into());

            let cmd = cmd
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            #[cfg(unix)]
            cmd.process_group(0);

            cmd.spawn().map(|child| Process {
                command: String::from(command),
                child,
                guard,
                deadline,
                _permit: permit,
            })
        })
    }

    /// Feed `input` to the child's stdin while copying its stdout into `output`
    ///
    /// Stderr is collected and logged. The child is killed if it outlives the deadline.
    #[tracing::instrument(skip_all, fields(command = %self.command))]
    pub(crate) async fn pipe<R, W>(self, input: R, output: &mut W) -> Result<(), ProcessError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Process {
            command,
            mut child,
            guard,
            deadline,
            _permit,
        } = self;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(ProcessError::Other(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Child is missing a piped stream",
            )));
        };

        let remaining = deadline.saturating_duration_since(Instant::now());

        let res = drive(&mut child, input, stdin, stdout, stderr, output)
            .with_timeout(remaining)
            .await;

        let (status, write_res, read_res, stderr_bytes) = match res {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(ProcessError::Other(e)),
            Err(_) => {
                kill_group(&mut child).map_err(ProcessError::Other)?;
                child.wait().await.map_err(ProcessError::Other)?;

                return Err(ProcessError::Timeout(command));
            }
        };

        if !stderr_bytes.is_empty() {
            tracing::warn!(
                "{command} stderr: {}",
                String::from_utf8_lossy(&stderr_bytes).trim_end()
            );
        }

        if !status.success() {
            return Err(ProcessError::Status(command, status));
        }

        write_res.map_err(|e| ProcessError::Write(command.clone(), e))?;
        read_res.map_err(|e| ProcessError::Read(command.clone(), e))?;

        guard.disarm();

        Ok(())
    }
}

/// Kill the child along with anything it spawned into its process group
#[cfg(unix)]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    use nix::{
        errno::Errno,
        sys::signal::{killpg, Signal},
        unistd::Pid,
    };

    // already reaped
    let Some(pid) = child.id() else {
        return Ok(());
    };

    let pgid = i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

type DriveOutcome = (
    ExitStatus,
    std::io::Result<()>,
    std::io::Result<()>,
    Vec<u8>,
);

async fn drive<R, W>(
    child: &mut Child,
    mut input: R,
    mut stdin: tokio::process::ChildStdin,
    mut stdout: tokio::process::ChildStdout,
    mut stderr: tokio::process::ChildStderr,
    output: &mut W,
) -> std::io::Result<DriveOutcome>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let write = async move {
        let res = match tokio::io::copy(&mut input, &mut stdin).await {
            Ok(_) => stdin.shutdown().await,
            Err(e) => Err(e),
        };

        // child closing stdin early is decided by its exit status
        match res {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            res => res,
        }
    };

    let read = async {
        tokio::io::copy(&mut stdout, output).await?;
        output.flush().await
    };

    let drain = async move {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).await.map(|_| buf)
    };

    let (write_res, read_res, stderr_res) = tokio::join!(write, read, drain);

    let status = child.wait().await?;

    Ok((status, write_res, read_res, stderr_res.unwrap_or_default()))
}
