//! Execution step for code running
//!
//! Runs a built program with input and classifies the result.

use std::time::Duration;

use tracing::{debug, instrument};

use crate::process::{self, ProcessOutput};
use crate::runner::{ExecuteError, ExecutionHandle};

/// Execute a handle once with `input` on stdin
#[instrument(skip(handle, input), fields(job_id = %handle.job_id(), language = handle.language()))]
pub async fn execute_handle(
    handle: &ExecutionHandle,
    input: &[u8],
) -> Result<String, ExecuteError> {
    let output = process::run(handle.spec(), input, Some(handle.timeout())).await?;

    debug!(
        exit_code = ?output.exit_code,
        timed_out = output.timed_out,
        output_limit_exceeded = output.output_limit_exceeded,
        wall_time = ?output.wall_time,
        "execution complete"
    );

    classify(&output, handle.timeout())
}

/// Runtime error message for a program killed for writing too much
pub const OUTPUT_LIMIT_EXCEEDED: &str = "output limit exceeded";

/// Turn a finished process into program output or an execution error
///
/// A timeout wins over everything else, then an output overflow. Otherwise a
/// non-zero exit or any non-blank stderr is a runtime error carrying the
/// (trimmed) stderr, or a description of the exit when stderr is blank.
pub(crate) fn classify(output: &ProcessOutput, timeout: Duration) -> Result<String, ExecuteError> {
    if output.timed_out {
        return Err(ExecuteError::TimeLimitExceeded(timeout));
    }

    if output.output_limit_exceeded {
        return Err(ExecuteError::Runtime(OUTPUT_LIMIT_EXCEEDED.to_owned()));
    }

    let stderr = output.stderr_lossy();
    let stderr = stderr.trim();

    if output.exit_code == Some(0) && stderr.is_empty() {
        return Ok(output.stdout_lossy());
    }

    let message = if !stderr.is_empty() {
        stderr.to_owned()
    } else if let Some(code) = output.exit_code {
        format!("exited with code {code}")
    } else if let Some(signal) = output.signal {
        format!("terminated by signal {signal}")
    } else {
        "exited abnormally".to_owned()
    };
    Err(ExecuteError::Runtime(message))
}
