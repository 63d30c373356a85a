//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI flags / environment
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!
//! Overrides directory changes:
//!     watcher.rs detects change
//!     → RegistryLoader rebuilds the rule registry
//!     → atomic swap of the SharedRegistry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the rule registry reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::ProxyConfig;
pub use schema::{CorsConfig, ListenerConfig, ObservabilityConfig, OverridesConfig, TimeoutConfig, UpstreamConfig};
