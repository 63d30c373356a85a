//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the override proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Upstream origin for requests no rule handles.
    pub upstream: UpstreamConfig,

    /// Rule discovery and dispatch settings.
    pub overrides: OverridesConfig,

    /// CORS headers added to override responses.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8787").
    pub bind_address: String,

    /// Largest request body buffered for rule evaluation, in bytes. 0 means no limit.
    ///
    /// Every request is buffered before dispatch, so the limit applies to
    /// forwarded requests too.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8787".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Upstream (passthrough) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to (e.g., "http://127.0.0.1:3000").
    pub target: String,

    /// Rewrite the Host header to the upstream authority.
    pub change_origin: bool,

    /// Add X-Forwarded-For / -Host / -Proto headers.
    pub forwarded_headers: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: "http://127.0.0.1:3000".to_string(),
            change_origin: true,
            forwarded_headers: true,
        }
    }
}

/// Override rule settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OverridesConfig {
    /// Directory scanned for `*.toml` rule files.
    pub directory: Option<PathBuf>,

    /// Reload rules when the directory changes.
    pub watch: bool,

    /// Register the built-in `GET /__ping` rule.
    pub builtin_ping: bool,

    /// Deadline for a single override handler, in milliseconds. Unset waits forever.
    pub handler_timeout_ms: Option<u64>,
}

impl Default for OverridesConfig {
    fn default() -> Self {
        Self {
            directory: Some(PathBuf::from("overrides")),
            watch: true,
            builtin_ping: true,
            handler_timeout_ms: None,
        }
    }
}

/// CORS configuration for override responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Add CORS headers to override responses.
    pub enabled: bool,

    /// Fixed allowed origin. Unset mirrors the request's Origin header.
    pub allow_origin: Option<String>,

    /// Send `Access-Control-Allow-Credentials: true` for mirrored origins.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origin: None,
            allow_credentials: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upstream response timeout in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            upstream_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Colored console output.
    pub ansi: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ansi: true,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
