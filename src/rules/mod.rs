//! Override rules.
//!
//! # Data Flow
//! ```text
//! Rule construction (at startup / reload):
//!     Rule::route(methods, path, handler, settings)   positional form
//!     RuleSpec::new()...build()                       record form
//!     → normalize methods (uppercase, validated)
//!     → compile Matcher (ExactPath | RegexPath | Custom)
//!     → immutable Rule
//!
//! Request time:
//!     Rule::test(&request) → enabled && method && matcher
//!     Rule::invoke(request) → Reply::Respond | Reply::Continue
//! ```
//!
//! # Design Decisions
//! - Predicates are compiled once; no type inspection while dispatching
//! - The enabled flag and method set are part of `Rule::test`, so the
//!   dispatcher never special-cases them
//! - Construction problems are `RuleError`s, never request-time failures

pub mod builder;
pub mod rule;

use thiserror::Error;

pub use builder::{RuleSettings, RuleSpec};
pub use rule::{Handler, Matcher, MethodSet, PathSpec, Predicate, Provenance, Reply, Rule};

/// Error type produced by user predicates and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors raised while building a rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// Record form without a handler.
    #[error("rule requires a handler")]
    MissingHandler,

    /// Record form with neither a path nor a test.
    #[error("rule requires either path or test")]
    MissingMatcher,

    /// Positional form with an empty method list.
    #[error("rule requires at least one HTTP method")]
    NoMethods,

    /// Method token that is not a valid HTTP method.
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    /// Path regex that failed to compile.
    #[error("invalid path pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
