//! Test case evaluation
//!
//! Runs a built program against each test case in order and compares
//! normalized output.

use tracing::{debug, instrument, warn};

use crate::runner::{ExecuteError, ExecutionHandle, Runner};
use crate::store::ContentStore;
use crate::types::{CaseError, TestCase, TestOutcome};

/// Result of evaluating every test case of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,

    /// Input references of failed cases, in declared order
    pub failed_cases: Vec<String>,

    pub outcomes: Vec<TestOutcome>,
}

/// Canonical form used for output comparison
///
/// CRLF becomes LF and leading/trailing whitespace is dropped. Whitespace
/// inside the text is kept.
pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim().to_owned()
}

/// Evaluate `handle` against `cases`
///
/// Every case runs even after a failure. Errors for a case are logged and
/// recorded in its outcome; they never abort the evaluation.
#[instrument(skip_all, fields(job_id = %handle.job_id(), cases = cases.len()))]
pub async fn evaluate(
    runner: &dyn Runner,
    handle: &ExecutionHandle,
    cases: &[TestCase],
    content: &dyn ContentStore,
) -> Evaluation {
    let mut outcomes = Vec::with_capacity(cases.len());

    for case in cases {
        let outcome = evaluate_case(runner, handle, case, content).await;
        debug!(case = case.id(), passed = outcome.passed, "test case evaluated");
        outcomes.push(outcome);
    }

    let failed_cases: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.passed)
        .map(|o| o.test_case_id.clone())
        .collect();

    Evaluation {
        passed: failed_cases.is_empty(),
        failed_cases,
        outcomes,
    }
}

async fn evaluate_case(
    runner: &dyn Runner,
    handle: &ExecutionHandle,
    case: &TestCase,
    content: &dyn ContentStore,
) -> TestOutcome {
    let result = run_case(runner, handle, case, content).await;

    let passed = match result {
        Ok((ref actual, ref expected)) => normalize_output(actual) == normalize_output(expected),
        Err(ref e) => {
            warn!(case = case.id(), error = %e, "test case failed to run");
            false
        }
    };

    TestOutcome {
        test_case_id: case.id().to_owned(),
        passed,
        result: result.map(|(actual, _)| actual),
    }
}

/// Fetch a case's data and execute it, returning (actual, expected)
async fn run_case(
    runner: &dyn Runner,
    handle: &ExecutionHandle,
    case: &TestCase,
    content: &dyn ContentStore,
) -> Result<(String, String), CaseError> {
    let input = content
        .get_content(&case.input_ref)
        .await
        .map_err(|e| CaseError::Io(e.to_string()))?;
    let expected = content
        .get_content(&case.output_ref)
        .await
        .map_err(|e| CaseError::Io(e.to_string()))?;

    let actual = runner
        .execute(handle, input.as_bytes())
        .await
        .map_err(|e| match e {
            ExecuteError::Runtime(msg) => CaseError::RuntimeError(msg),
            ExecuteError::TimeLimitExceeded(_) => CaseError::TimeLimitExceeded,
            ExecuteError::Process(e) => CaseError::Io(e.to_string()),
        })?;

    Ok((actual, expected))
}
