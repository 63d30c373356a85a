//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, trace)
//!     → middleware/overrides.rs (buffer body, dispatch rules)
//!         → override response + cors.rs headers
//!         → or server.rs fallback → proxy::Upstream
//!     → Send to client
//! ```

pub mod cors;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{OverrideRequest, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
