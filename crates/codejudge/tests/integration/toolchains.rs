use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use codejudge::config::Config;
use codejudge::{
    Collaborators, FsContentStore, Judge, JudgeError, MemoryStore, Question, SubmitRequest,
};

use super::{entries, fixture_path, fixture_source};

/// Default languages, with scratch directories under `root`
fn toolchain_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.code_dir = root.join("codes");
    config.output_dir = root.join("outputs");
    config
}

/// Recursively copy the directory `from` to `to`
fn copy_tree(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// A judge over a scratch copy of the fixture content under `root`
///
/// Returns the content root so tests can look at archived sources.
async fn fixture_judge(config: &Config, root: &Path, question: &str) -> (Judge, Question, PathBuf) {
    let question = Question::from_file(fixture_path(&format!("questions/{question}.toml")))
        .expect("question manifest");

    let content_root = root.join("content");
    copy_tree(&fixture_path("content"), &content_root);

    let records = Arc::new(MemoryStore::new());
    records.insert_question(question.clone()).await;
    let stores = Collaborators {
        content: Arc::new(FsContentStore::new(content_root.clone())),
        questions: records.clone(),
        users: records.clone(),
        submissions: records,
    };
    (Judge::new(config, stores).expect("judge"), question, content_root)
}

/// Archived sources must never land in the checked-in fixtures
fn assert_fixtures_untouched() {
    assert!(!fixture_path("content/submissions").exists());
}

fn request(language: &str, source: &str, question: &str) -> SubmitRequest {
    SubmitRequest {
        owner_id: "alice".to_owned(),
        language: language.to_owned(),
        code: fixture_source(source),
        question_id: question.to_owned(),
    }
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_echo_passes() {
    let dir = tempfile::tempdir().unwrap();
    let config = toolchain_config(dir.path());
    let (judge, _, content_root) = fixture_judge(&config, dir.path(), "echo").await;

    let out = judge
        .run_code("python", &fixture_source("echo.py"), "hello\n")
        .await
        .expect("run");
    assert_eq!(out, "hello\n");

    let result = judge.submit(&request("py", "echo.py", "echo")).await.expect("submit");
    assert!(result.passed, "failed cases: {:?}", result.failed_cases);
    assert_eq!(judge.solved_count("alice").await.unwrap(), 1);
    assert_eq!(entries(&config.code_dir), 0);

    let archived = content_root.join(format!("submissions/alice/{}.py", result.submission_id));
    assert_eq!(fs::read_to_string(archived).unwrap(), fixture_source("echo.py"));
    assert_fixtures_untouched();
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_exception_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, _, _) = fixture_judge(&toolchain_config(dir.path()), dir.path(), "echo").await;

    match judge.run_code("python", &fixture_source("divide.py"), "0\n").await {
        Err(JudgeError::Runtime(stderr)) => assert!(stderr.contains("ZeroDivisionError")),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires g++"]
async fn test_cpp_sum_passes_all_cases() {
    let dir = tempfile::tempdir().unwrap();
    let config = toolchain_config(dir.path());
    let (judge, question, content_root) = fixture_judge(&config, dir.path(), "sum").await;

    for language in ["cpp", "c++", "c"] {
        let result = judge
            .submit(&request(language, "sum.cpp", "sum"))
            .await
            .expect("submit");
        assert!(result.passed, "{language}: {:?}", result.failed_cases);
    }
    assert_eq!(question.test_cases.len(), 3);
    assert_eq!(entries(&config.code_dir), 0);
    assert_eq!(entries(&config.output_dir), 0);
    assert_eq!(entries(&content_root.join("submissions/alice")), 3);
    assert_fixtures_untouched();
}

#[tokio::test]
#[ignore = "requires g++"]
async fn test_cpp_wrong_program_fails_cases() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, _, _) = fixture_judge(&toolchain_config(dir.path()), dir.path(), "sum").await;

    // Echoing the first line is wrong for every case
    let result = judge
        .submit(&request("cpp", "echo.cpp", "sum"))
        .await
        .expect("submit");
    assert!(!result.passed);
    assert_eq!(
        result.failed_cases,
        vec!["sum/input1.txt", "sum/input2.txt", "sum/input3.txt"]
    );
}

#[tokio::test]
#[ignore = "requires g++"]
async fn test_cpp_missing_semicolon_is_compilation_error() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, _, content_root) =
        fixture_judge(&toolchain_config(dir.path()), dir.path(), "sum").await;

    match judge
        .submit(&request("cpp", "missing_semicolon.cpp", "sum"))
        .await
    {
        Err(JudgeError::Compilation(diagnostics)) => assert!(diagnostics.contains("error")),
        other => panic!("expected compilation error, got {other:?}"),
    }
    assert_eq!(judge.submission_history("alice", None).await.unwrap().len(), 0);
    assert!(!content_root.join("submissions").exists());
}

#[tokio::test]
#[ignore = "requires g++"]
async fn test_cpp_infinite_loop_hits_time_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = toolchain_config(dir.path());
    config.per_case_timeout = 2.0;
    let (judge, _, _) = fixture_judge(&config, dir.path(), "sum").await;

    let start = Instant::now();
    let result = judge
        .run_code("cpp", &fixture_source("infinite_loop.cpp"), "")
        .await;
    let elapsed = start.elapsed();

    match result {
        Err(JudgeError::TimeLimitExceeded(limit)) => assert_eq!(limit, Duration::from_secs(2)),
        other => panic!("expected time limit exceeded, got {other:?}"),
    }
    // Includes compilation
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(30));
}

#[tokio::test]
#[ignore = "requires a JDK"]
async fn test_java_echo_passes() {
    let dir = tempfile::tempdir().unwrap();
    let config = toolchain_config(dir.path());
    let (judge, _, content_root) = fixture_judge(&config, dir.path(), "echo").await;

    let result = judge
        .submit(&request("java", "Main.java", "echo"))
        .await
        .expect("submit");
    assert!(result.passed, "failed cases: {:?}", result.failed_cases);
    assert_eq!(entries(&config.output_dir), 0);
    assert!(content_root
        .join(format!("submissions/alice/{}.java", result.submission_id))
        .is_file());
    assert_fixtures_untouched();
}
