//! Compiled languages (C, C++, Java)
//!
//! `build` runs the configured compiler once per job; the resulting handle
//! runs the produced executable (or JVM class directory).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::{CompileConfig, Language, RunConfig};
use crate::job::ExecutionJob;
use crate::process::{self, ProcessOutput, ProcessSpec};
use crate::runner::{CompileError, ExecutionHandle, Runner};

/// Runner for languages with a build step
#[derive(Debug, Clone)]
pub struct CompiledRunner {
    language: String,
    compile: CompileConfig,
    run: RunConfig,
    build_timeout: Duration,
    run_timeout: Duration,
}

impl CompiledRunner {
    pub fn new(
        language: impl Into<String>,
        compile: CompileConfig,
        run: RunConfig,
        build_timeout: Duration,
        run_timeout: Duration,
    ) -> Self {
        Self {
            language: language.into(),
            compile,
            run,
            build_timeout,
            run_timeout,
        }
    }

    /// Put the source where the compiler expects it
    ///
    /// With a configured `source_name` the artifact path becomes a directory
    /// holding a copy of the source under that name; otherwise the source is
    /// compiled in place and the artifact is a single file.
    async fn stage_source(&self, job: &ExecutionJob) -> Result<PathBuf, CompileError> {
        let artifact = job.artifact_path();
        match self.compile.source_name {
            Some(ref name) => {
                tokio::fs::create_dir_all(artifact).await?;
                let staged = artifact.join(name);
                tokio::fs::copy(job.source_path(), &staged).await?;
                debug!(staged = %staged.display(), "staged source");
                Ok(staged)
            }
            None => {
                if let Some(parent) = artifact.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Ok(job.source_path().to_owned())
            }
        }
    }

    fn with_working_dir(&self, spec: ProcessSpec, job: &ExecutionJob) -> ProcessSpec {
        if self.compile.source_name.is_some() {
            spec.working_dir(job.artifact_path())
        } else {
            spec
        }
    }
}

#[async_trait]
impl Runner for CompiledRunner {
    fn language(&self) -> &str {
        &self.language
    }

    fn is_compiled(&self) -> bool {
        true
    }

    #[instrument(skip(self, job), fields(job_id = %job.id(), language = %self.language))]
    async fn build(&self, job: &ExecutionJob) -> Result<ExecutionHandle, CompileError> {
        let source = self.stage_source(job).await?;
        let artifact = job.artifact_path();

        let compile_cmd = Language::expand_command(&self.compile.command, &source, artifact);
        debug!(?compile_cmd, "compiling");
        let spec = ProcessSpec::new(compile_cmd)
            .envs(&self.compile.env)
            .max_output(self.run.max_output);
        let spec = self.with_working_dir(spec, job);

        let output = process::run(&spec, b"", Some(self.build_timeout)).await?;

        if output.timed_out {
            return Err(CompileError::Timeout(self.build_timeout));
        }
        if !output.is_success() {
            debug!(exit_code = ?output.exit_code, "compilation failed");
            return Err(CompileError::Failed {
                exit_code: output.exit_code,
                diagnostics: compiler_output(&output),
            });
        }

        debug!(wall_time = ?output.wall_time, "compilation complete");

        let run_cmd = Language::expand_command(&self.run.command, &source, artifact);
        let spec = ProcessSpec::new(run_cmd)
            .envs(&self.run.env)
            .max_output(self.run.max_output);
        let spec = self.with_working_dir(spec, job);
        Ok(ExecutionHandle::new(job.id(), &self.language, spec, self.run_timeout))
    }
}

/// Compiler stdout followed by stderr, or a description of the exit if both are empty
fn compiler_output(output: &ProcessOutput) -> String {
    let mut text = output.stdout_lossy();
    let stderr = output.stderr_lossy();
    if !text.is_empty() && !stderr.is_empty() {
        text.push('\n');
    }
    text.push_str(&stderr);

    if text.is_empty() {
        match output.exit_code {
            Some(code) => format!("compiler exited with code {code}"),
            None => "compiler terminated abnormally".to_owned(),
        }
    } else {
        text
    }
}
