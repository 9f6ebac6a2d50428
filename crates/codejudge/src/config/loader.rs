//! Configuration file loading for codejudge
//!
//! Handles loading and parsing configuration files using the config crate.

use std::collections::HashMap;
use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, FileExtension, normalize_language};

/// Prefix for environment variable overrides (e.g. `CODEJUDGE_PER_CASE_TIMEOUT`)
const ENV_PREFIX: &str = "CODEJUDGE";

impl Config {
    /// Load configuration from a file
    ///
    /// Scalar settings can be overridden through `CODEJUDGE_*` environment
    /// variables.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_jobs must be at least 1".to_owned(),
            ));
        }
        check_timeout("per_case_timeout", self.per_case_timeout)?;
        check_timeout("compile_timeout", self.compile_timeout)?;
        if self.max_output == 0 {
            return Err(ConfigError::Invalid(
                "max_output must be at least 1 byte".to_owned(),
            ));
        }

        // Every accepted name maps to exactly one language
        let mut owners: HashMap<String, &str> = HashMap::new();

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(limit) = lang.run.time_limit {
                check_timeout(&format!("languages.{id}.run.time_limit"), limit)?;
            }
            if lang.run.max_output == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "languages.{id}.run.max_output must be at least 1 byte"
                )));
            }
            if let Some(ref compile) = lang.compile {
                if compile.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty compile command"
                    )));
                }
                if let Some(limit) = compile.time_limit {
                    check_timeout(&format!("languages.{id}.compile.time_limit"), limit)?;
                }
                if let Some(ref name) = compile.source_name
                    && (name.is_empty() || name.contains('/') || name.contains(".."))
                {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has invalid source_name '{name}'"
                    )));
                }
            }

            for name in std::iter::once(id).chain(lang.aliases.iter()) {
                let normalized = normalize_language(name);
                if normalized.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has an empty alias"
                    )));
                }
                FileExtension::for_language(&normalized).map_err(|_| {
                    ConfigError::Invalid(format!(
                        "language name '{name}' cannot be used as a file extension"
                    ))
                })?;
                if let Some(other) = owners.insert(normalized, id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "language name '{name}' is claimed by both '{other}' and '{id}'"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_timeout(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{key} must be a positive number of seconds, got {value}"
        )))
    }
}
