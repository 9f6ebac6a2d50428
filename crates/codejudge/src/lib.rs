//! A library for judging submitted programs.
//!
//! Codejudge provides an async Rust API for compiling or interpreting
//! untrusted source code, running it against test cases over stdin/stdout
//! and recording a verdict.
//!
//! # Features
//!
//! - **Multi-language**: compiled (C, C++, Java) and interpreted (Python) runners.
//! - **Build once, run many**: a submission is compiled once and executed per test case.
//! - **TOML configuration**: per-language compiler and interpreter commands.
//! - **Wall-clock limits**: timed-out programs are killed with their whole process group.
//! - **Pluggable storage**: test data, questions, users and submissions behind async traits.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use job::{ExecutionJob, Materializer};
pub use judge::{Collaborators, ErrorPayload, Judge, JudgeError, SubmitRequest};
pub use runner::{
    CompileError, CompiledRunner, ExecuteError, ExecutionHandle, InterpretedRunner, RunError,
    Runner, RunnerRegistry,
};
pub use store::{
    ContentStore, FsContentStore, MemoryStore, QuestionStore, StoreError, SubmissionStore,
    UserStore,
};
pub use types::{
    CaseError, Difficulty, JobState, Question, SampleTestCase, Submission, SubmitResult, TestCase,
    TestOutcome,
};

pub mod config;
pub mod job;
pub mod judge;
pub mod process;
pub mod runner;
pub mod store;
pub mod types;
