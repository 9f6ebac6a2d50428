//! Integration tests for codejudge
//!
//! Judging tests use `sh` based languages and run everywhere. Tests against
//! real toolchains (g++, python3, javac) need the `integration-tests` feature
//! and are marked `#[ignore]`. To include them:
//!    cargo test -p codejudge --features integration-tests -- --include-ignored

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codejudge::config::{CompileConfig, Config, Language, RunConfig};
use codejudge::{Collaborators, Judge, MemoryStore};

mod judging;
#[cfg(feature = "integration-tests")]
mod toolchains;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
#[cfg_attr(not(feature = "integration-tests"), allow(dead_code))]
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

pub(crate) fn fixture_path(relative: &str) -> PathBuf {
    Path::new(FIXTURES_PATH).join(relative)
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Config with two toolchain-free languages rooted in `root`
///
/// `shell` (alias `sh`) interprets the source with `sh`. `fakecc` "compiles"
/// by copying the script, failing with a diagnostic on sources containing
/// BROKEN.
pub(crate) fn shell_config(root: &Path) -> Config {
    let mut config = Config::empty();
    config.code_dir = root.join("codes");
    config.output_dir = root.join("outputs");
    config.per_case_timeout = 0.5;

    config.languages.insert(
        "shell".to_owned(),
        Language {
            name: "POSIX shell".to_owned(),
            aliases: strings(&["sh"]),
            compile: None,
            run: RunConfig {
                command: strings(&["sh", "{source}"]),
                env: HashMap::new(),
                time_limit: None,
                max_output: None,
            },
        },
    );
    config.languages.insert(
        "fakecc".to_owned(),
        Language {
            name: "Fake compiler".to_owned(),
            aliases: vec![],
            compile: Some(CompileConfig {
                command: strings(&[
                    "sh",
                    "-c",
                    "if grep -q BROKEN \"$0\"; then echo \"$0:1: error: expected ';'\" >&2; exit 1; fi; cp \"$0\" \"$1\"",
                    "{source}",
                    "{output}",
                ]),
                source_name: None,
                env: HashMap::new(),
                time_limit: None,
            }),
            run: RunConfig {
                command: strings(&["sh", "{output}"]),
                env: HashMap::new(),
                time_limit: None,
                max_output: None,
            },
        },
    );
    config
}

/// A judge over `config` backed by one in-memory store
pub(crate) fn memory_judge(config: &Config) -> (Judge, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let judge = Judge::new(config, Collaborators::shared(store.clone())).expect("judge");
    (judge, store)
}

/// Number of entries in `dir`, treating a missing directory as empty
pub(crate) fn entries(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(iter) => iter.count(),
        Err(_) => 0,
    }
}
