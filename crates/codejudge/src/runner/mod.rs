//! Language runners
//!
//! A [`Runner`] knows how to build (if needed) and execute programs of one
//! language. Judging builds once and executes the returned
//! [`ExecutionHandle`] once per test case.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use crate::runner::compiled::CompiledRunner;
pub use crate::runner::execute::execute_handle;
pub use crate::runner::interpreted::InterpretedRunner;
pub use crate::runner::registry::RunnerRegistry;

mod compiled;
mod execute;
mod interpreted;
mod registry;

use crate::job::ExecutionJob;
use crate::process::{ProcessError, ProcessSpec};

/// Errors that occur while building a program
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler rejected the program; diagnostics are passed through verbatim
    #[error("compilation failed: {diagnostics}")]
    Failed {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("compilation timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to prepare build: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run compiler: {0}")]
    Process(#[from] ProcessError),
}

/// Errors that occur while executing a built program
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Non-zero exit, death by signal, or output on stderr
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("time limit exceeded after {0:?}")]
    TimeLimitExceeded(Duration),

    #[error("failed to run program: {0}")]
    Process(#[from] ProcessError),
}

/// Errors from a one-off build-and-execute
///
/// Preserves which phase failed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

/// A built program, ready to be executed any number of times
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    job_id: Uuid,
    language: String,
    spec: ProcessSpec,
    timeout: Duration,
}

impl ExecutionHandle {
    pub fn new(job_id: Uuid, language: impl Into<String>, spec: ProcessSpec, timeout: Duration) -> Self {
        Self {
            job_id,
            language: language.into(),
            spec,
            timeout,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// The fully expanded run command
    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Wall-clock limit applied to every execution
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Build and execute protocol for one language family
#[async_trait]
pub trait Runner: Debug + Send + Sync {
    /// Canonical language ID this runner serves
    fn language(&self) -> &str;

    /// Whether `build` invokes a compiler
    fn is_compiled(&self) -> bool;

    /// Prepare the job's source for execution
    ///
    /// Build output goes to the job's artifact path, which the job removes
    /// on release.
    async fn build(&self, job: &ExecutionJob) -> Result<ExecutionHandle, CompileError>;

    /// Run a built program once with `input` on stdin, returning its stdout
    async fn execute(
        &self,
        handle: &ExecutionHandle,
        input: &[u8],
    ) -> Result<String, ExecuteError> {
        execute::execute_handle(handle, input).await
    }

    /// Build then execute once
    async fn run_once(&self, job: &ExecutionJob, input: &[u8]) -> Result<String, RunError> {
        let handle = self.build(job).await?;
        Ok(self.execute(&handle, input).await?)
    }
}
