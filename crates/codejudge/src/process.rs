//! Process spawning and I/O
//!
//! Runs one child process with piped stdin/stdout/stderr under a wall-clock
//! limit. The child leads its own process group so that everything it forks
//! is killed with it when the limit is hit.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

/// Errors that prevent a process from running to completion
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A command to run
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Working directory (inherits the caller's when None)
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables
    pub env: HashMap<String, String>,

    /// Cap on captured bytes per output stream; the process is killed past it
    pub max_output: Option<u64>,
}

impl ProcessSpec {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            working_dir: None,
            env: HashMap::new(),
            max_output: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn max_output(mut self, limit: Option<u64>) -> Self {
        self.max_output = limit;
        self
    }

    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Everything observed about a finished (or killed) process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,

    pub stdout: Vec<u8>,

    pub stderr: Vec<u8>,

    /// Wall clock time from spawn to exit
    pub wall_time: Duration,

    /// Whether the wall-clock limit expired and the process was killed
    pub timed_out: bool,

    /// Whether a stream exceeded `max_output` and the process was killed
    pub output_limit_exceeded: bool,
}

impl ProcessOutput {
    /// Exited on its own with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.timed_out && !self.output_limit_exceeded && self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run a process to completion, feeding `input` on stdin
///
/// The whole input is written and stdin is closed so the child sees EOF.
/// Stdout and stderr are drained concurrently with the write. When
/// `timeout` expires the process group is killed and the partial output is
/// returned with `timed_out` set. A stream producing more than
/// `spec.max_output` bytes gets the group killed the same way; the capture
/// is truncated to the limit and `output_limit_exceeded` is set.
#[instrument(skip(spec, input), fields(program = spec.command.first().map(String::as_str)))]
pub async fn run(
    spec: &ProcessSpec,
    input: &[u8],
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ProcessError> {
    let program = spec.command.first().ok_or(ProcessError::EmptyCommand)?;

    let mut command = Command::new(program);
    command
        .args(&spec.command[1..])
        .envs(&spec.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    if let Some(ref dir) = spec.working_dir {
        command.current_dir(dir);
    }

    let started = Instant::now();
    let mut child = command.spawn().map_err(|source| ProcessError::SpawnFailed {
        program: program.clone(),
        source,
    })?;
    let pid = child.id();

    debug!(?pid, len = input.len(), "spawned process");

    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let streams = Streams {
        pid,
        limit: spec.max_output,
        stdout: &mut stdout_buf,
        stderr: &mut stderr_buf,
    };
    let completion = collect(&mut child, input, streams);
    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, completion).await {
            Ok(status) => Some(status?),
            Err(_) => None,
        },
        None => Some(completion.await?),
    };

    let mut output = ProcessOutput {
        wall_time: started.elapsed(),
        ..Default::default()
    };

    match status {
        Some((status, overflowed)) => {
            if overflowed {
                warn!(?pid, limit = spec.max_output, "output limit exceeded, process group killed");
                output.output_limit_exceeded = true;
            }
            apply_status(&mut output, status);
        }
        None => {
            warn!(?pid, ?timeout, "wall-clock limit exceeded, killing process group");
            kill_group(pid);
            if let Err(e) = child.kill().await {
                debug!(error = %e, "child already gone after group kill");
            }
            output.timed_out = true;
            if let Ok(Some(status)) = child.try_wait() {
                apply_status(&mut output, status);
            }
        }
    }

    output.stdout = stdout_buf;
    output.stderr = stderr_buf;

    debug!(
        exit_code = ?output.exit_code,
        signal = ?output.signal,
        timed_out = output.timed_out,
        output_limit_exceeded = output.output_limit_exceeded,
        wall_time = ?output.wall_time,
        stdout_len = output.stdout.len(),
        stderr_len = output.stderr.len(),
        "process finished"
    );

    Ok(output)
}

/// Capture buffers for one process
struct Streams<'a> {
    pid: Option<u32>,
    limit: Option<u64>,
    stdout: &'a mut Vec<u8>,
    stderr: &'a mut Vec<u8>,
}

/// Write stdin, drain stdout/stderr and wait for exit
///
/// Returns the exit status and whether either stream hit the output cap.
async fn collect(
    child: &mut Child,
    input: &[u8],
    streams: Streams<'_>,
) -> Result<(ExitStatus, bool), ProcessError> {
    let stdin = child.stdin.take();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::new(ErrorKind::BrokenPipe, "stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::new(ErrorKind::BrokenPipe, "stderr not captured"))?;

    let write_input = async move {
        if let Some(mut stdin) = stdin {
            match stdin.write_all(input).await {
                // The program may legitimately exit without reading its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
                Ok(()) => {}
            }
            // Dropping stdin closes the pipe and signals EOF
            drop(stdin);
        }
        Ok(())
    };

    let Streams {
        pid,
        limit,
        stdout: stdout_buf,
        stderr: stderr_buf,
    } = streams;

    let (written, read_out, read_err) = tokio::join!(
        write_input,
        read_capped(stdout, stdout_buf, limit, pid),
        read_capped(stderr, stderr_buf, limit, pid),
    );
    written?;
    let overflowed = read_out? | read_err?;

    Ok((child.wait().await?, overflowed))
}

/// Read a stream to EOF, keeping at most `limit` bytes
///
/// Past the limit the process group is killed so the writer stops and the
/// other stream reaches EOF. Returns whether the limit was exceeded.
async fn read_capped<R>(
    reader: R,
    buf: &mut Vec<u8>,
    limit: Option<u64>,
    pid: Option<u32>,
) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let Some(limit) = limit else {
        let mut reader = reader;
        reader.read_to_end(buf).await?;
        return Ok(false);
    };

    reader.take(limit.saturating_add(1)).read_to_end(buf).await?;
    if buf.len() as u64 <= limit {
        return Ok(false);
    }

    buf.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    kill_group(pid);
    Ok(true)
}

fn apply_status(output: &mut ProcessOutput, status: ExitStatus) {
    use std::os::unix::process::ExitStatusExt;

    output.exit_code = status.code();
    output.signal = status.signal();
}

/// Best-effort SIGKILL of the child's whole process group
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(pid, error = %e, "killpg failed");
    }
}
