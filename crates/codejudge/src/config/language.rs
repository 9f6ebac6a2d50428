use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Fixed language -> extension table used when materializing sources.
///
/// Anything not listed falls back to the language string itself.
const EXTENSION_MAP: [(&str, &str); 4] = [("cpp", "cpp"), ("c", "c"), ("python", "py"), ("java", "java")];

/// Configuration for a programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++ (GCC)")
    pub name: String,

    /// Additional names accepted for this language (e.g., "c++", "py")
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Compilation configuration (None for interpreted languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Expand placeholders in the given command
    ///
    /// `{source}` and `{output}` become the given paths, `{stem}` the source
    /// file name without its extension.
    pub fn expand_command(command: &[String], source: &Path, output: &Path) -> Vec<String> {
        let source_str = source.to_string_lossy();
        let output_str = output.to_string_lossy();
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();

        command
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source_str)
                    .replace("{output}", &output_str)
                    .replace("{stem}", &stem)
            })
            .collect()
    }
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    /// Extension for a submitted language name
    pub fn for_language(language: &str) -> Result<Self, ConfigError> {
        let language = language.trim().to_lowercase();
        let mapped = EXTENSION_MAP
            .iter()
            .find(|(name, _)| *name == language)
            .map(|(_, ext)| *ext);

        match mapped {
            Some(ext) => Self::new(ext),
            None => Self::new(&language),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the build step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {output}, {stem}
    pub command: Vec<String>,

    /// Entry file name the source is staged under before building
    ///
    /// When set, `{output}` is a per-job directory holding the staged source
    /// and everything the compiler writes (e.g. "Main.java" for javac).
    /// When unset, `{output}` is a single executable file.
    #[serde(default)]
    pub source_name: Option<String>,

    /// Environment variables to set during compilation
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Wall-clock limit for the build in seconds (overrides `compile_timeout`)
    #[serde(default)]
    pub time_limit: Option<f64>,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {output}, {stem}
    pub command: Vec<String>,

    /// Environment Variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Wall-clock limit per execution in seconds (overrides `per_case_timeout`)
    #[serde(default)]
    pub time_limit: Option<f64>,

    /// Cap on captured stdout and stderr, each, in bytes (overrides `max_output`)
    #[serde(default)]
    pub max_output: Option<u64>,
}
