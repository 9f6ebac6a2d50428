use std::sync::Arc;
use std::time::{Duration, Instant};

use codejudge::{
    ContentStore, JudgeError, MemoryStore, Question, SubmitRequest, TestCase, UserStore,
};

use super::{entries, memory_judge, shell_config};

/// Store `(input, expected)` pairs as `q/<n>.in` / `q/<n>.out` and return the cases
async fn seed_cases(store: &MemoryStore, question: &str, data: &[(&str, &str)]) -> Vec<TestCase> {
    let mut cases = Vec::new();
    for (n, (input, output)) in data.iter().enumerate() {
        let input_ref = format!("{question}/{n}.in");
        let output_ref = format!("{question}/{n}.out");
        store.put_content(&input_ref, input).await.unwrap();
        store.put_content(&output_ref, output).await.unwrap();
        cases.push(TestCase::new(input_ref, output_ref));
    }
    cases
}

fn request(language: &str, code: &str) -> SubmitRequest {
    SubmitRequest {
        owner_id: "alice".to_owned(),
        language: language.to_owned(),
        code: code.to_owned(),
        question_id: "echo".to_owned(),
    }
}

const ECHO: &str = "read line; echo \"$line\"";

#[tokio::test]
async fn run_code_echoes_input() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, _) = memory_judge(&shell_config(dir.path()));

    let out = judge.run_code("sh", ECHO, "hello\n").await.unwrap();
    assert_eq!(out.trim_end(), "hello");

    let out = judge.run_code("fakecc", ECHO, "compiled\n").await.unwrap();
    assert_eq!(out.trim_end(), "compiled");
}

#[tokio::test]
async fn run_code_reports_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, _) = memory_judge(&shell_config(dir.path()));

    match judge.run_code("shell", "echo 'division by zero' >&2; exit 1", "").await {
        Err(JudgeError::Runtime(msg)) => assert_eq!(msg, "division by zero"),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[tokio::test]
async fn run_code_reports_time_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, _) = memory_judge(&shell_config(dir.path()));

    let start = Instant::now();
    let result = judge.run_code("shell", "while :; do :; done", "").await;
    assert!(matches!(result, Err(JudgeError::TimeLimitExceeded(_))));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn all_cases_pass() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(&store, "echo", &[("a\n", "a"), ("b c\r\n", "b c\n")]).await;

    let result = judge.submit_code(&request("sh", ECHO), &cases).await.unwrap();
    assert!(result.passed);
    assert!(result.failed_cases.is_empty());

    let saved = store.all_submissions().await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].submission_id, result.submission_id);
    assert_eq!(saved[0].language, "shell");
}

#[tokio::test]
async fn one_failing_case_is_reported_and_later_cases_still_run() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(
        &store,
        "echo",
        &[("a\n", "a"), ("b\n", "not b"), ("c\n", "c")],
    )
    .await;

    // Each run appends to a log so we can see every case executed
    let log = dir.path().join("runs.log");
    let code = format!("read line; echo x >> '{}'; echo \"$line\"", log.display());

    let result = judge.submit_code(&request("sh", &code), &cases).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.failed_cases, vec!["echo/1.in".to_owned()]);
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 3);
}

#[tokio::test]
async fn failed_case_order_follows_declaration() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(
        &store,
        "echo",
        &[("1\n", "x"), ("2\n", "2"), ("3\n", "y"), ("4\n", "z")],
    )
    .await;

    let result = judge.submit_code(&request("sh", ECHO), &cases).await.unwrap();
    assert_eq!(
        result.failed_cases,
        vec!["echo/0.in", "echo/2.in", "echo/3.in"]
    );
}

#[tokio::test]
async fn compile_error_aborts_without_execution_or_record() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(&store, "echo", &[("a\n", "a")]).await;

    let marker = dir.path().join("ran");
    let code = format!("BROKEN\ntouch '{}'", marker.display());

    match judge.submit_code(&request("fakecc", &code), &cases).await {
        Err(JudgeError::Compilation(diagnostics)) => {
            assert!(diagnostics.contains("error: expected ';'"))
        }
        other => panic!("expected compilation error, got {other:?}"),
    }

    assert!(!marker.exists());
    assert!(store.all_submissions().await.is_empty());
    assert_eq!(judge.solved_count("alice").await.unwrap(), 0);
}

#[tokio::test]
async fn temp_files_are_removed_after_every_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = shell_config(dir.path());
    let (judge, store) = memory_judge(&config);
    let cases = seed_cases(&store, "echo", &[("a\n", "a"), ("b\n", "b")]).await;

    judge.run_code("sh", ECHO, "x\n").await.unwrap();
    judge.run_code("fakecc", ECHO, "x\n").await.unwrap();
    let _ = judge.run_code("sh", "exit 2", "").await;
    let _ = judge.run_code("fakecc", "BROKEN", "").await;
    judge.submit_code(&request("fakecc", ECHO), &cases).await.unwrap();
    judge.submit_code(&request("sh", "echo wrong"), &cases).await.unwrap();
    let _ = judge.submit_code(&request("fakecc", "BROKEN"), &cases).await;

    assert_eq!(entries(&config.code_dir), 0);
    assert_eq!(entries(&config.output_dir), 0);
}

#[tokio::test]
async fn unsupported_language_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = shell_config(dir.path());
    let (judge, store) = memory_judge(&config);

    match judge.run_code("ruby", "puts 1", "").await {
        Err(JudgeError::UnsupportedLanguage(name)) => assert_eq!(name, "ruby"),
        other => panic!("expected unsupported language, got {other:?}"),
    }
    let result = judge.submit_code(&request(" Brainfuck ", "+"), &[]).await;
    assert!(matches!(result, Err(JudgeError::UnsupportedLanguage(_))));

    assert!(!config.code_dir.exists());
    assert!(store.all_submissions().await.is_empty());
}

#[tokio::test]
async fn two_passing_submissions_solve_once() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(&store, "echo", &[("a\n", "a")]).await;

    for _ in 0..2 {
        let result = judge.submit_code(&request("sh", ECHO), &cases).await.unwrap();
        assert!(result.passed);
    }

    assert_eq!(judge.solved_count("alice").await.unwrap(), 1);
    assert_eq!(
        store.solved_questions("alice").await.unwrap().into_iter().collect::<Vec<_>>(),
        vec!["echo".to_owned()]
    );
    assert_eq!(
        judge.submission_history("alice", Some("echo")).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn failing_submission_is_recorded_but_not_solved() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(&store, "echo", &[("a\n", "a")]).await;

    let result = judge.submit_code(&request("sh", "echo nope"), &cases).await.unwrap();
    assert!(!result.passed);

    assert_eq!(judge.solved_count("alice").await.unwrap(), 0);
    let history = judge.submission_history("alice", None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].failed_case_ids, vec!["echo/0.in".to_owned()]);
}

#[tokio::test]
async fn source_is_archived_under_owner() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(&store, "echo", &[("a\n", "a")]).await;

    let result = judge.submit_code(&request("sh", ECHO), &cases).await.unwrap();

    let history = judge.submission_history("alice", None).await.unwrap();
    let code_ref = &history[0].code_ref;
    assert_eq!(code_ref, &format!("submissions/alice/{}.sh", result.submission_id));
    assert_eq!(store.get_content(code_ref).await.unwrap(), ECHO);
}

#[tokio::test]
async fn timed_out_case_fails_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(&store, "echo", &[("a\n", "a"), ("loop\n", "loop")]).await;

    let code = "read line; if [ \"$line\" = loop ]; then while :; do :; done; fi; echo \"$line\"";
    let result = judge.submit_code(&request("sh", code), &cases).await.unwrap();

    assert!(!result.passed);
    assert_eq!(result.failed_cases, vec!["echo/1.in".to_owned()]);
}

#[tokio::test]
async fn submit_resolves_question_test_cases() {
    let dir = tempfile::tempdir().unwrap();
    let (judge, store) = memory_judge(&shell_config(dir.path()));
    let cases = seed_cases(&store, "echo", &[("a\n", "a"), ("b\n", "b")]).await;

    store
        .insert_question(Question {
            question_id: "echo".to_owned(),
            title: "Echo".to_owned(),
            difficulty: codejudge::Difficulty::Easy,
            tags: Default::default(),
            description_ref: "echo/description.md".to_owned(),
            test_cases: cases,
            sample_test_cases: vec![],
        })
        .await;

    let result = judge.submit(&request("sh", ECHO)).await.unwrap();
    assert!(result.passed);

    let mut missing = request("sh", ECHO);
    missing.question_id = "nope".to_owned();
    match judge.submit(&missing).await {
        Err(e @ JudgeError::QuestionNotFound(_)) => assert_eq!(e.code(), "question_not_found"),
        other => panic!("expected question not found, got {other:?}"),
    }

    // Language is checked before the question lookup
    let mut both = request("ruby", ECHO);
    both.question_id = "nope".to_owned();
    assert!(matches!(
        judge.submit(&both).await,
        Err(JudgeError::UnsupportedLanguage(_))
    ));
}

#[tokio::test]
async fn concurrent_requests_share_the_job_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = shell_config(dir.path());
    config.max_concurrent_jobs = 2;
    let (judge, _) = memory_judge(&config);
    let judge = Arc::new(judge);

    let mut tasks = Vec::new();
    for i in 0..6 {
        let judge = Arc::clone(&judge);
        tasks.push(tokio::spawn(async move {
            judge
                .run_code("sh", ECHO, &format!("job {i}\n"))
                .await
                .map(|out| (i, out))
        }));
    }

    for task in tasks {
        let (i, out) = task.await.unwrap().unwrap();
        assert_eq!(out.trim_end(), format!("job {i}"));
    }
    assert_eq!(entries(&config.code_dir), 0);
}

#[tokio::test]
async fn runaway_output_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = shell_config(dir.path());
    config.max_output = 4096;
    let (judge, store) = memory_judge(&config);

    let start = Instant::now();
    match judge.run_code("sh", "yes", "").await {
        Err(JudgeError::Runtime(msg)) => assert_eq!(msg, "output limit exceeded"),
        other => panic!("expected runtime error, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(5));

    // Only the flooding case fails
    let cases = seed_cases(&store, "echo", &[("a\n", "a"), ("flood\n", "flood")]).await;
    let code = "read line; if [ \"$line\" = flood ]; then yes; fi; echo \"$line\"";
    let result = judge.submit_code(&request("sh", code), &cases).await.unwrap();
    assert_eq!(result.failed_cases, vec!["echo/1.in".to_owned()]);
    assert_eq!(entries(&config.code_dir), 0);
}

#[tokio::test]
async fn language_output_cap_overrides_global() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = shell_config(dir.path());
    config.languages.get_mut("shell").unwrap().run.max_output = Some(8);
    let (judge, _) = memory_judge(&config);

    // 9 bytes: over the shell cap, far under the global default
    let result = judge.run_code("sh", "printf 123456789", "").await;
    assert!(matches!(result, Err(JudgeError::Runtime(ref msg)) if msg == "output limit exceeded"));

    let out = judge.run_code("fakecc", "printf 123456789", "").await.unwrap();
    assert_eq!(out, "123456789");
}
