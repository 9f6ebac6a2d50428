//! Interpreted languages (Python)

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Language, RunConfig};
use crate::job::ExecutionJob;
use crate::process::ProcessSpec;
use crate::runner::{CompileError, ExecutionHandle, Runner};

/// Runner that hands the source straight to an interpreter on every execution
#[derive(Debug, Clone)]
pub struct InterpretedRunner {
    language: String,
    run: RunConfig,
    run_timeout: Duration,
}

impl InterpretedRunner {
    pub fn new(language: impl Into<String>, run: RunConfig, run_timeout: Duration) -> Self {
        Self {
            language: language.into(),
            run,
            run_timeout,
        }
    }
}

#[async_trait]
impl Runner for InterpretedRunner {
    fn language(&self) -> &str {
        &self.language
    }

    fn is_compiled(&self) -> bool {
        false
    }

    /// No build step; only the interpreter command is prepared
    async fn build(&self, job: &ExecutionJob) -> Result<ExecutionHandle, CompileError> {
        let command =
            Language::expand_command(&self.run.command, job.source_path(), job.artifact_path());
        debug!(job_id = %job.id(), ?command, "prepared interpreter command");

        let spec = ProcessSpec::new(command)
            .envs(&self.run.env)
            .max_output(self.run.max_output);
        Ok(ExecutionHandle::new(job.id(), &self.language, spec, self.run_timeout))
    }
}
