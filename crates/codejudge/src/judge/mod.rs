//! Judging orchestration
//!
//! [`Judge`] ties the pieces together for one request: it resolves the
//! language, materializes the source into an [`ExecutionJob`], builds it once
//! through the language's [`Runner`], evaluates every test case, and then
//! cleans up and persists the verdict.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use crate::judge::evaluate::{Evaluation, evaluate, normalize_output};
use crate::config::{Config, FileExtension};
use crate::job::{ExecutionJob, Materializer};
use crate::process::ProcessError;
use crate::runner::{CompileError, ExecuteError, RunError, Runner, RunnerRegistry};
use crate::store::{ContentStore, QuestionStore, StoreError, SubmissionStore, UserStore};
use crate::types::{JobState, Submission, SubmitResult, TestCase};

mod evaluate;

/// Request-level failures
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Compiler diagnostics, verbatim
    #[error("compilation error: {0}")]
    Compilation(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("time limit exceeded after {0:?}")]
    TimeLimitExceeded(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("question '{0}' not found")]
    QuestionNotFound(String),
}

impl JudgeError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            JudgeError::UnsupportedLanguage(_) => "unsupported_language",
            JudgeError::Compilation(_) => "compilation_error",
            JudgeError::Runtime(_) => "runtime_error",
            JudgeError::TimeLimitExceeded(_) => "time_limit_exceeded",
            JudgeError::Io(_) | JudgeError::Process(_) => "io_error",
            JudgeError::Store(_) => "store_error",
            JudgeError::QuestionNotFound(_) => "question_not_found",
        }
    }

    /// Structured form surfaced to callers
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}

impl From<CompileError> for JudgeError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::Failed { diagnostics, .. } => JudgeError::Compilation(diagnostics),
            CompileError::Timeout(limit) => {
                JudgeError::Compilation(format!("compilation timed out after {limit:?}"))
            }
            CompileError::Io(e) => JudgeError::Io(e),
            CompileError::Process(e) => JudgeError::Process(e),
        }
    }
}

impl From<ExecuteError> for JudgeError {
    fn from(e: ExecuteError) -> Self {
        match e {
            ExecuteError::Runtime(msg) => JudgeError::Runtime(msg),
            ExecuteError::TimeLimitExceeded(limit) => JudgeError::TimeLimitExceeded(limit),
            ExecuteError::Process(e) => JudgeError::Process(e),
        }
    }
}

impl From<RunError> for JudgeError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::Compile(e) => e.into(),
            RunError::Execute(e) => e.into(),
        }
    }
}

/// `{code, message}` error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// A graded submission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub owner_id: String,
    pub language: String,
    pub code: String,
    pub question_id: String,
}

/// External services the judge reads from and writes to
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentStore>,
    pub questions: Arc<dyn QuestionStore>,
    pub users: Arc<dyn UserStore>,
    pub submissions: Arc<dyn SubmissionStore>,
}

impl Collaborators {
    /// Use one value for every store
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ContentStore + QuestionStore + UserStore + SubmissionStore + 'static,
    {
        Self {
            content: store.clone(),
            questions: store.clone(),
            users: store.clone(),
            submissions: store,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// The judging engine
#[derive(Debug)]
pub struct Judge {
    registry: RunnerRegistry,
    materializer: Materializer,

    /// Absolute, so expanded commands never depend on a child's working directory
    output_dir: PathBuf,

    /// Bounds concurrently building or executing jobs
    permits: Arc<Semaphore>,

    stores: Collaborators,
}

impl Judge {
    /// Create a judge for the given configuration
    ///
    /// Relative `code_dir` and `output_dir` are resolved against the current
    /// directory.
    pub fn new(config: &Config, stores: Collaborators) -> Result<Self, JudgeError> {
        let code_dir = std::path::absolute(&config.code_dir)?;
        let output_dir = std::path::absolute(&config.output_dir)?;

        Ok(Self {
            registry: RunnerRegistry::from_config(config),
            materializer: Materializer::new(code_dir),
            output_dir,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            stores,
        })
    }

    pub fn registry(&self) -> &RunnerRegistry {
        &self.registry
    }

    fn runner_for(&self, language: &str) -> Result<Arc<dyn Runner>, JudgeError> {
        self.registry
            .resolve(language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.trim().to_owned()))
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, JudgeError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| JudgeError::Io(std::io::Error::other("job limiter closed")))
    }

    async fn create_job(
        &self,
        runner: &dyn Runner,
        language: &str,
        code: &str,
    ) -> Result<ExecutionJob, JudgeError> {
        let job = ExecutionJob::create(
            &self.materializer,
            &self.output_dir,
            runner.language(),
            language,
            code,
        )
        .await?;
        Ok(job)
    }

    /// Build and run `code` once with `input`, returning its stdout
    ///
    /// Nothing is persisted.
    #[instrument(skip(self, code, input))]
    pub async fn run_code(
        &self,
        language: &str,
        code: &str,
        input: &str,
    ) -> Result<String, JudgeError> {
        let runner = self.runner_for(language)?;
        let _permit = self.acquire().await?;

        let job = self.create_job(runner.as_ref(), language, code).await?;
        let result = runner.run_once(&job, input.as_bytes()).await;
        job.release().await;

        Ok(result?)
    }

    /// Judge `code` against the given test cases and persist the verdict
    #[instrument(skip(self, request, cases), fields(owner = %request.owner_id, question = %request.question_id, language = %request.language))]
    pub async fn submit_code(
        &self,
        request: &SubmitRequest,
        cases: &[TestCase],
    ) -> Result<SubmitResult, JudgeError> {
        let runner = self.runner_for(&request.language)?;
        let permit = self.acquire().await?;

        let mut job = self
            .create_job(runner.as_ref(), &request.language, &request.code)
            .await?;

        let handle = match runner.build(&job).await {
            Ok(handle) => handle,
            Err(e) => {
                job.release().await;
                return Err(e.into());
            }
        };
        job.advance(JobState::Built);

        job.advance(JobState::Evaluating);
        let evaluation = evaluate(
            runner.as_ref(),
            &handle,
            cases,
            self.stores.content.as_ref(),
        )
        .await;
        job.advance(JobState::Verdicted);

        job.release().await;
        drop(permit);

        info!(
            passed = evaluation.passed,
            failed = evaluation.failed_cases.len(),
            total = cases.len(),
            "verdict"
        );

        let submission = self.record(request, runner.language(), evaluation).await?;
        Ok(SubmitResult {
            submission_id: submission.submission_id,
            passed: submission.passed,
            failed_cases: submission.failed_case_ids,
        })
    }

    /// Judge a submission against its question's test cases
    ///
    /// The language is checked before the question is looked up.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResult, JudgeError> {
        self.runner_for(&request.language)?;

        let question = self
            .stores
            .questions
            .find_question(&request.question_id)
            .await?
            .ok_or_else(|| JudgeError::QuestionNotFound(request.question_id.clone()))?;

        self.submit_code(request, &question.test_cases).await
    }

    /// Archive the source, save the submission and update the solved-set
    async fn record(
        &self,
        request: &SubmitRequest,
        language_id: &str,
        evaluation: Evaluation,
    ) -> Result<Submission, JudgeError> {
        let submission_id = Uuid::new_v4();
        let code_ref = archive_ref(&request.owner_id, submission_id, &request.language);

        self.stores
            .content
            .put_content(&code_ref, &request.code)
            .await?;

        let submission = Submission {
            submission_id,
            owner_id: request.owner_id.clone(),
            question_id: request.question_id.clone(),
            language: language_id.to_owned(),
            source_text: request.code.clone(),
            code_ref,
            passed: evaluation.passed,
            failed_case_ids: evaluation.failed_cases,
            created_at: Utc::now(),
        };
        if let Err(e) = self.stores.submissions.save_submission(&submission).await {
            // Drop the archived source so no blob outlives its record
            if let Err(cleanup) = self.stores.content.delete(&submission.code_ref).await {
                warn!(
                    code_ref = %submission.code_ref,
                    error = %cleanup,
                    "failed to remove archived source"
                );
            }
            return Err(e.into());
        }
        debug!(submission_id = %submission.submission_id, "submission saved");

        if submission.passed {
            self.stores
                .users
                .add_solved_question(&submission.owner_id, &submission.question_id)
                .await?;
        }

        Ok(submission)
    }

    /// Number of distinct questions `owner_id` has solved
    pub async fn solved_count(&self, owner_id: &str) -> Result<usize, JudgeError> {
        Ok(self.stores.users.solved_questions(owner_id).await?.len())
    }

    /// Past submissions of `owner_id`, optionally limited to one question
    pub async fn submission_history(
        &self,
        owner_id: &str,
        question_id: Option<&str>,
    ) -> Result<Vec<Submission>, JudgeError> {
        Ok(self
            .stores
            .submissions
            .submissions_for(owner_id, question_id)
            .await?)
    }
}

/// Content store reference for an archived source
fn archive_ref(owner_id: &str, submission_id: Uuid, language: &str) -> String {
    match FileExtension::for_language(language) {
        Ok(ext) => format!("submissions/{owner_id}/{submission_id}.{ext}"),
        Err(_) => {
            warn!(language, "no file extension for archived source");
            format!("submissions/{owner_id}/{submission_id}")
        }
    }
}
