//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! OverrideRequest + RequestContext
//!     → dispatcher.rs (walk registry snapshot, first match wins)
//!     → Dispatch::Handled(response) | Dispatch::Passthrough
//!     → context.rs fields (id, rule, served_by) consumed by logging/metrics
//! ```

pub mod context;
pub mod dispatcher;

pub use context::{RequestContext, ServedBy};
pub use dispatcher::{Dispatch, DispatchError, Dispatcher};
