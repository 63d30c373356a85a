//! Rule registry subsystem.
//!
//! # Data Flow
//! ```text
//! Startup / reload:
//!     compiled-in RuleSets (registration order)
//!     + overrides dir *.toml (file-name order, one FileSource each)
//!     → loader.rs (collect, tag provenance, skip failing sources)
//!     → Registry (ordered, immutable)
//!     → SharedRegistry::replace (atomic swap)
//!
//! Request time:
//!     SharedRegistry::snapshot() → Arc<Registry> → dispatcher walks it in order
//! ```
//!
//! # Design Decisions
//! - Order is semantic: the first matching rule wins
//! - The registry is never edited in place; reload builds a new one
//! - A broken source is logged and skipped, never fatal for the whole build

pub mod files;
pub mod loader;
pub mod source;
pub mod store;

pub use loader::RegistryLoader;
pub use source::{RuleSet, RuleSource, SourceError};
pub use store::{Registry, SharedRegistry};
