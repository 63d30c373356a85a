//! First-match rule dispatch.
//!
//! # Algorithm
//! ```text
//! snapshot registry
//! for rule in registry (in order):
//!     test(request)  Err / panic → 500 override_failed, stop
//!                    false       → next rule
//!                    true        → invoke handler, stop
//!                                    Respond(resp)  → resp
//!                                    Continue       → passthrough
//!                                    Err / panic    → 500 override_failed
//!                                    deadline hit   → 504 override_timeout
//! no rule matched → passthrough
//! ```
//!
//! # Design Decisions
//! - Rules after the first match are never tested
//! - A failing rule terminates the request; later rules and passthrough are not tried
//! - `Continue` goes straight to passthrough and never re-enters the scan

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{Method, StatusCode},
    response::Response,
};
use futures_util::FutureExt;
use thiserror::Error;

use crate::dispatch::context::{RequestContext, ServedBy};
use crate::http::request::OverrideRequest;
use crate::http::response::{error_response, OVERRIDE_FAILED, OVERRIDE_TIMEOUT};
use crate::registry::SharedRegistry;
use crate::rules::{BoxError, Reply, Rule};

/// Outcome of dispatching one request.
#[derive(Debug)]
pub enum Dispatch {
    /// A rule produced the response (possibly an error response).
    Handled(Response),
    /// No rule handled the request; forward it upstream.
    Passthrough,
}

/// Failure of a user predicate or handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Predicate(BoxError),

    #[error("{0}")]
    Handler(BoxError),

    #[error("{0}")]
    Panicked(String),

    #[error("handler did not respond within {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    /// Uniform error response for this failure.
    pub fn to_response(&self) -> Response {
        match self {
            DispatchError::Timeout(_) => {
                error_response(StatusCode::GATEWAY_TIMEOUT, OVERRIDE_TIMEOUT, self.to_string())
            }
            _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, OVERRIDE_FAILED, self.to_string()),
        }
    }
}

/// Walks the registry for each request and runs at most one handler.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            handler_timeout: None,
        }
    }

    /// Cancel handlers that run longer than `timeout`. `None` waits forever.
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Dispatch a request, recording the outcome in `ctx`.
    pub async fn dispatch(&self, ctx: &mut RequestContext, request: &Arc<OverrideRequest>) -> Dispatch {
        let registry = self.registry.snapshot();

        for rule in registry.iter() {
            let matched = match std::panic::catch_unwind(AssertUnwindSafe(|| rule.test(request))) {
                Ok(Ok(matched)) => matched,
                Ok(Err(e)) => return self.fail(ctx, rule, DispatchError::Predicate(e)),
                Err(panic) => return self.fail(ctx, rule, DispatchError::Panicked(panic_message(panic))),
            };

            if matched {
                ctx.rule = rule.display_name();
                tracing::debug!(
                    request_id = ctx.id,
                    rule = ctx.rule.as_deref().unwrap_or("-"),
                    "Override matched"
                );
                return self.invoke(ctx, rule, request).await;
            }
        }

        ctx.served_by = ServedBy::Passthrough;
        Dispatch::Passthrough
    }

    /// First rule a CORS preflight asking for `method` would reach.
    ///
    /// Failing or panicking tests count as no match; a preflight never
    /// produces an `override_failed` response.
    pub fn preflight_rule(&self, request: &OverrideRequest, method: &Method) -> Option<Arc<Rule>> {
        let registry = self.registry.snapshot();
        let found = registry.iter().find(|rule| {
            matches!(
                std::panic::catch_unwind(AssertUnwindSafe(|| rule.accepts_preflight(request, method))),
                Ok(Ok(true))
            )
        });
        found.cloned()
    }

    async fn invoke(&self, ctx: &mut RequestContext, rule: &Arc<Rule>, request: &Arc<OverrideRequest>) -> Dispatch {
        let call = AssertUnwindSafe(async { rule.invoke(request.clone()).await }).catch_unwind();

        let outcome = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => return self.fail(ctx, rule, DispatchError::Timeout(limit)),
            },
            None => call.await,
        };

        match outcome {
            Ok(Ok(Reply::Respond(response))) => {
                ctx.served_by = ServedBy::Override;
                Dispatch::Handled(response)
            }
            Ok(Ok(Reply::Continue)) => {
                tracing::debug!(
                    request_id = ctx.id,
                    rule = ctx.rule.as_deref().unwrap_or("-"),
                    "Override handler deferred to passthrough"
                );
                ctx.served_by = ServedBy::Passthrough;
                Dispatch::Passthrough
            }
            Ok(Err(e)) => self.fail(ctx, rule, DispatchError::Handler(e)),
            Err(panic) => self.fail(ctx, rule, DispatchError::Panicked(panic_message(panic))),
        }
    }

    fn fail(&self, ctx: &mut RequestContext, rule: &Rule, error: DispatchError) -> Dispatch {
        ctx.rule = rule.display_name();
        ctx.served_by = ServedBy::Override;
        tracing::error!(
            request_id = ctx.id,
            rule = ctx.rule.as_deref().unwrap_or("-"),
            error = %error,
            "Override failed"
        );
        Dispatch::Handled(error.to_response())
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
