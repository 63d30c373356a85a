//! Rule sources.
//!
//! A source is one unit of rule discovery: a compiled-in [`RuleSet`] or a
//! single rule file. Each exposes one entry point, [`RuleSource::rules`],
//! returning its rules in declaration order.

use std::path::PathBuf;

use thiserror::Error;

use crate::rules::{Provenance, Rule, RuleError};

/// Errors that make a whole source unusable.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{binding}: {source}")]
    Rule {
        binding: String,
        #[source]
        source: RuleError,
    },

    #[error("{binding}: {reason}")]
    Invalid { binding: String, reason: String },
}

/// Something that produces an ordered list of rules.
pub trait RuleSource: Send + Sync {
    /// Provenance label of this source.
    fn label(&self) -> String;

    /// Build the rules. Called at startup and on every reload.
    fn rules(&self) -> Result<Vec<Rule>, SourceError>;
}

type RuleFactory = Box<dyn Fn() -> Result<Rule, RuleError> + Send + Sync>;

/// A compiled-in list of rule factories.
///
/// ```
/// use override_proxy::registry::{RuleSet, RuleSource};
/// use override_proxy::rules::{BoxError, Reply, RuleSpec};
///
/// let set = RuleSet::new("demo").rule(|| {
///     RuleSpec::new()
///         .path("/hello")
///         .handler(|_req| async { Ok::<_, BoxError>(Reply::respond("hi")) })
///         .build()
/// });
/// assert_eq!(set.rules().unwrap().len(), 1);
/// ```
pub struct RuleSet {
    label: String,
    factories: Vec<(Option<String>, RuleFactory)>,
}

impl RuleSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            factories: Vec::new(),
        }
    }

    /// Register an unnamed rule.
    pub fn rule<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Rule, RuleError> + Send + Sync + 'static,
    {
        self.factories.push((None, Box::new(factory)));
        self
    }

    /// Register a rule under a binding name used in error messages.
    pub fn named<F>(mut self, binding: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Rule, RuleError> + Send + Sync + 'static,
    {
        self.factories.push((Some(binding.into()), Box::new(factory)));
        self
    }
}

impl RuleSource for RuleSet {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn rules(&self) -> Result<Vec<Rule>, SourceError> {
        self.factories
            .iter()
            .enumerate()
            .map(|(index, (binding, factory))| -> Result<Rule, SourceError> {
                let rule = factory().map_err(|source| SourceError::Rule {
                    binding: binding.clone().unwrap_or_else(|| format!("rule[{}]", index)),
                    source,
                })?;
                Ok(match binding {
                    Some(binding) => {
                        rule.with_provenance(Provenance::new(self.label.clone(), Some(binding.clone())))
                    }
                    None => rule,
                })
            })
            .collect()
    }
}
