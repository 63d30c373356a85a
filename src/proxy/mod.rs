//! Passthrough subsystem.
//!
//! # Data Flow
//! ```text
//! Request not handled by any override
//!     → forward.rs (rewrite URI onto upstream base)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → hyper-util client → upstream
//!     → response relayed verbatim (or 502/504 proxy_error)
//! ```

pub mod forward;
pub mod headers;

pub use forward::{Upstream, UpstreamError};
