use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{Config, normalize_language};
use crate::runner::{CompiledRunner, InterpretedRunner, Runner};

/// Runners keyed by every accepted language name
///
/// Built once from the configuration; all call sites resolve through it.
#[derive(Debug, Clone, Default)]
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn Runner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One runner per configured language, reachable by ID and aliases
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        for (id, language) in &config.languages {
            let run_timeout = config.run_timeout(language);
            let mut run = language.run.clone();
            run.max_output = Some(config.output_limit(language));
            let runner: Arc<dyn Runner> = match language.compile {
                Some(ref compile) => Arc::new(CompiledRunner::new(
                    id.clone(),
                    compile.clone(),
                    run,
                    config.build_timeout(language),
                    run_timeout,
                )),
                None => Arc::new(InterpretedRunner::new(
                    id.clone(),
                    run,
                    run_timeout,
                )),
            };
            registry.register(runner, &language.aliases);
        }

        debug!(names = registry.runners.len(), "runner registry built");
        registry
    }

    /// Register a runner under its language ID and the given aliases
    pub fn register(&mut self, runner: Arc<dyn Runner>, aliases: &[String]) {
        let names = std::iter::once(runner.language().to_owned()).chain(aliases.iter().cloned());
        for name in names {
            self.runners
                .insert(normalize_language(&name), Arc::clone(&runner));
        }
    }

    /// Look up the runner for a submitted language name
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Runner>> {
        self.runners.get(&normalize_language(name)).cloned()
    }

    /// Every accepted language name, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.runners.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
