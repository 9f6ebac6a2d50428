use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ConfigError;

/// Difficulty of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A hidden test case, stored as references into the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Content reference of the input fed to stdin
    pub input_ref: String,

    /// Content reference of the expected output
    pub output_ref: String,
}

impl TestCase {
    pub fn new(input_ref: impl Into<String>, output_ref: impl Into<String>) -> Self {
        Self {
            input_ref: input_ref.into(),
            output_ref: output_ref.into(),
        }
    }

    /// Identifier reported for this case when it fails
    pub fn id(&self) -> &str {
        &self.input_ref
    }
}

/// A test case shown to the solver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleTestCase {
    pub input: String,
    pub output: String,
}

/// A judged question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,

    pub title: String,

    pub difficulty: Difficulty,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Content reference of the problem statement
    pub description_ref: String,

    /// Hidden test cases, evaluated in order
    #[serde(default)]
    pub test_cases: Vec<TestCase>,

    /// Visible examples
    #[serde(default)]
    pub sample_test_cases: Vec<SampleTestCase>,
}

impl Question {
    /// Load a question manifest (TOML, YAML or JSON, by extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let question = ConfigBuilder::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize::<Question>()?;

        if question.question_id.trim().is_empty() {
            return Err(ConfigError::Invalid("question_id must not be empty".to_owned()));
        }
        Ok(question)
    }
}

/// A recorded, judged submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: Uuid,
    pub owner_id: String,
    pub question_id: String,
    /// Canonical language ID the submission was judged with
    pub language: String,
    pub source_text: String,
    /// Content reference of the archived source
    pub code_ref: String,
    pub passed: bool,
    /// Identifiers of failed test cases, in evaluation order
    pub failed_case_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// What the caller of a submission gets back
///
/// Only identifiers of failing cases are exposed, never their expected output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub submission_id: Uuid,
    pub passed: bool,
    pub failed_cases: Vec<String>,
}

/// Why a single test case could not produce comparable output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum CaseError {
    /// Non-zero exit or output on stderr
    RuntimeError(String),
    /// Killed after exceeding the wall-clock limit
    TimeLimitExceeded,
    /// Test data or process plumbing failed
    Io(String),
}

impl std::fmt::Display for CaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseError::RuntimeError(msg) => write!(f, "runtime error: {msg}"),
            CaseError::TimeLimitExceeded => write!(f, "time limit exceeded"),
            CaseError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_case_id: String,
    pub passed: bool,
    /// Actual output, or the error that prevented producing it
    pub result: Result<String, CaseError>,
}

/// Lifecycle of a job inside one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    Materialized,
    Built,
    Evaluating,
    Verdicted,
    Cleaned,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Received => "received",
            JobState::Materialized => "materialized",
            JobState::Built => "built",
            JobState::Evaluating => "evaluating",
            JobState::Verdicted => "verdicted",
            JobState::Cleaned => "cleaned",
        };
        write!(f, "{s}")
    }
}
