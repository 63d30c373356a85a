//! Registry storage and atomic replacement.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::rules::Rule;

/// Ordered, immutable collection of rules.
#[derive(Debug, Default)]
pub struct Registry {
    rules: Vec<Arc<Rule>>,
}

impl Registry {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Display names in registry order, `-` for unnamed rules.
    pub fn names(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|rule| rule.display_name().unwrap_or_else(|| "-".to_string()))
            .collect()
    }
}

/// Shared handle to the active registry.
///
/// Readers take a snapshot per request and keep it until the request ends;
/// `replace` swaps in a complete new registry.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    inner: Arc<ArcSwap<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        metrics::gauge!("override_proxy_rules").set(registry.len() as f64);
        Self {
            inner: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    /// Current registry.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.inner.load_full()
    }

    /// Swap in a new registry, returning the previous one.
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        let len = registry.len();
        let previous = self.inner.swap(Arc::new(registry));
        tracing::info!(previous = previous.len(), current = len, "Rule registry replaced");
        metrics::gauge!("override_proxy_rules").set(len as f64);
        previous
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new(Registry::empty())
    }
}
