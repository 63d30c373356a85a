//! Per-request dispatch context.

use std::fmt;

/// How the response to a request was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    /// Not decided yet.
    Pending,
    /// A rule (or its failure) produced the response.
    Override,
    /// The request was forwarded upstream.
    Passthrough,
    /// The proxy refused the request before dispatch.
    Rejected,
}

impl ServedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedBy::Pending => "pending",
            ServedBy::Override => "override",
            ServedBy::Passthrough => "passthrough",
            ServedBy::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ServedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observability fields of one request, filled in by the dispatcher.
///
/// Advisory only: nothing here changes how a request is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Monotonic request sequence number.
    pub id: u64,
    /// Display name of the matched (or failing) rule.
    pub rule: Option<String>,
    pub served_by: ServedBy,
}

impl RequestContext {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            rule: None,
            served_by: ServedBy::Pending,
        }
    }
}
