//! Local development override proxy.
//!
//! Sits in front of a dev server and answers selected requests from local
//! override rules; everything else is forwarded to the upstream untouched.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                    OVERRIDE PROXY                      │
//!                    │                                                        │
//!   Client Request   │  ┌─────────┐    ┌────────────┐    ┌──────────────┐    │
//!  ──────────────────┼─▶│  http   │───▶│ middleware │───▶│  dispatch    │    │
//!                    │  │ server  │    │ (buffer)   │    │ first match  │    │
//!                    │  └─────────┘    └────────────┘    └──────┬───────┘    │
//!                    │                                  matched │ no match   │
//!                    │                        ┌─────────────────┴──────┐     │
//!                    │                        ▼                        ▼     │
//!                    │                 ┌──────────────┐        ┌───────────┐ │
//!  Client Response   │                 │ rule handler │        │   proxy   │─┼──▶ Upstream
//!  ◀─────────────────┼─────────────────│ + cors       │        │ upstream  │◀┼─── dev server
//!                    │                 └──────────────┘        └───────────┘ │
//!                    │                                                        │
//!                    │  registry (ArcSwap) ◀── loader ◀── builtin + *.toml    │
//!                    │        ▲                                               │
//!                    │        └── watcher (hot reload)                        │
//!                    └───────────────────────────────────────────────────────┘
//! ```

pub mod builtin;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod registry;
pub mod rules;

pub use config::schema::ProxyConfig;
pub use dispatch::{Dispatch, Dispatcher, RequestContext, ServedBy};
pub use http::{HttpServer, OverrideRequest};
pub use lifecycle::Shutdown;
pub use registry::{Registry, RegistryLoader, RuleSet, RuleSource, SharedRegistry};
pub use rules::{BoxError, Reply, Rule, RuleError, RuleSettings, RuleSpec};
