//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! override middleware (per request):
//!     RequestContext { id, rule, served_by }
//!     → logging.rs (one structured event per request)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Console (colored, RUST_LOG filterable)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
