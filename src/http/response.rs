//! Response helpers shared by the dispatcher and the passthrough.
//!
//! # Design Decisions
//! - Every error the proxy produces itself uses one JSON shape:
//!   `{"error": "<code>", "detail": "<message>"}`
//! - Codes are stable identifiers; details are human readable

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error code for a failed override predicate or handler.
pub const OVERRIDE_FAILED: &str = "override_failed";
/// Error code for an override handler that exceeded its deadline.
pub const OVERRIDE_TIMEOUT: &str = "override_timeout";
/// Error code for passthrough transport failures.
pub const PROXY_ERROR: &str = "proxy_error";
/// Error code for request bodies over the configured limit.
pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
/// Error code for request bodies that failed mid-read.
pub const BAD_REQUEST: &str = "bad_request";

/// JSON body of every proxy-generated error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// Build a JSON error response.
pub fn error_response(status: StatusCode, code: &str, detail: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: code.to_string(),
        detail: detail.into(),
    };
    (status, Json(body)).into_response()
}
