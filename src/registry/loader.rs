//! Registry population.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::files::discover_dir;
use crate::registry::source::RuleSource;
use crate::registry::store::Registry;
use crate::rules::{Provenance, Rule};

/// Builds a [`Registry`] from compiled-in sources and a rule directory.
///
/// Compiled-in sources come first in registration order, then the directory's
/// rule files in file-name order.
#[derive(Clone, Default)]
pub struct RegistryLoader {
    sources: Vec<Arc<dyn RuleSource>>,
    directory: Option<PathBuf>,
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl RuleSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Collect every source into a new registry. Failing sources are skipped.
    pub fn load(&self) -> Registry {
        let mut rules = Vec::new();

        for source in &self.sources {
            collect(source.as_ref(), &mut rules);
        }

        if let Some(directory) = &self.directory {
            match discover_dir(directory) {
                Ok(files) => {
                    for file in &files {
                        collect(file, &mut rules);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(directory = %directory.display(), "Overrides directory not found, no file rules loaded");
                }
                Err(e) => {
                    tracing::warn!(directory = %directory.display(), error = %e, "Failed to scan overrides directory");
                }
            }
        }

        let registry = Registry::new(rules);
        tracing::debug!(rules = ?registry.names(), "Registry built");
        registry
    }
}

fn collect(source: &dyn RuleSource, out: &mut Vec<Rule>) {
    let label = source.label();
    match source.rules() {
        Ok(rules) => {
            let single = rules.len() == 1;
            let count = rules.len();
            for (index, rule) in rules.into_iter().enumerate() {
                // Sources that name their rules keep those bindings.
                if rule.provenance().is_some() {
                    out.push(rule);
                    continue;
                }
                let binding = (!single).then(|| format!("rule[{}]", index));
                out.push(rule.with_provenance(Provenance::new(label.clone(), binding)));
            }
            tracing::debug!(source = %label, rules = count, "Loaded rule source");
        }
        Err(e) => {
            tracing::warn!(source = %label, error = %e, "Skipping rule source");
        }
    }
}
