use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{CompileConfig, FileExtension, Language, RunConfig};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../codejudge.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for codejudge
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory submitted sources are materialized into
    #[serde(default = "default_code_dir")]
    pub code_dir: PathBuf,

    /// Directory build artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Root of the filesystem content store
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Maximum number of jobs building or executing at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Wall-clock limit for one test case execution, in seconds
    #[serde(default = "default_per_case_timeout")]
    pub per_case_timeout: f64,

    /// Wall-clock limit for one build, in seconds
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout: f64,

    /// Cap on captured stdout and stderr of one process, each, in bytes
    #[serde(default = "default_max_output")]
    pub max_output: u64,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            code_dir: default_code_dir(),
            output_dir: default_output_dir(),
            content_dir: default_content_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            per_case_timeout: default_per_case_timeout(),
            compile_timeout: default_compile_timeout(),
            max_output: default_max_output(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Wall-clock limit for executing a program of the given language
    pub fn run_timeout(&self, language: &Language) -> Duration {
        Duration::from_secs_f64(language.run.time_limit.unwrap_or(self.per_case_timeout))
    }

    /// Output cap for executing a program of the given language
    pub fn output_limit(&self, language: &Language) -> u64 {
        language.run.max_output.unwrap_or(self.max_output)
    }

    /// Wall-clock limit for building a program of the given language
    pub fn build_timeout(&self, language: &Language) -> Duration {
        let secs = language
            .compile
            .as_ref()
            .and_then(|c| c.time_limit)
            .unwrap_or(self.compile_timeout);
        Duration::from_secs_f64(secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

/// Canonical form of a language name: trimmed and lower-cased
pub fn normalize_language(name: &str) -> String {
    name.trim().to_lowercase()
}

fn default_code_dir() -> PathBuf {
    PathBuf::from("codes")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_per_case_timeout() -> f64 {
    2.0
}

fn default_compile_timeout() -> f64 {
    30.0
}

fn default_max_output() -> u64 {
    64 * 1024 * 1024
}
