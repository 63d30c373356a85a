//! Request pipeline middleware.

pub mod overrides;

pub use overrides::override_middleware;
