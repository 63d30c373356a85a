//! Override middleware.
//! Runs the dispatcher ahead of the passthrough stage and answers CORS
//! preflights for override-only endpoints.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::dispatch::{Dispatch, RequestContext, ServedBy};
use crate::http::cors::{apply_cors, preflight_method, preflight_response};
use crate::http::request::{BodyError, OverrideRequest, X_REQUEST_ID};
use crate::http::response::{error_response, BAD_REQUEST, PAYLOAD_TOO_LARGE};
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn override_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let mut ctx = RequestContext::new(state.sequence.fetch_add(1, Ordering::Relaxed) + 1);

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = match OverrideRequest::from_request(request, state.max_body_bytes).await {
        Ok((buffered, extensions)) => {
            let buffered = Arc::new(buffered);
            match state.dispatcher.dispatch(&mut ctx, &buffered).await {
                Dispatch::Handled(mut response) => {
                    apply_cors(&state.cors, buffered.headers(), response.headers_mut());
                    response
                }
                Dispatch::Passthrough => match answer_preflight(&state, &mut ctx, &buffered) {
                    Some(response) => response,
                    None => next.run(buffered.to_request(extensions)).await,
                },
            }
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to buffer request body");
            ctx.served_by = ServedBy::Rejected;
            match e {
                BodyError::TooLarge { .. } => {
                    error_response(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE, e.to_string())
                }
                BodyError::Read(_) => error_response(
                    StatusCode::BAD_REQUEST,
                    BAD_REQUEST,
                    "request body could not be read",
                ),
            }
        }
    };

    let status = response.status();
    tracing::info!(
        id = ctx.id,
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        served_by = %ctx.served_by,
        rule = ctx.rule.as_deref().unwrap_or("-"),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(method.as_str(), status.as_u16(), ctx.served_by, start);

    response
}

/// Answer a CORS preflight for a method some override serves on this path.
///
/// Runs only after dispatch found nothing, so explicit `OPTIONS` rules win.
fn answer_preflight(state: &AppState, ctx: &mut RequestContext, request: &OverrideRequest) -> Option<Response> {
    if !state.cors.enabled {
        return None;
    }
    let method = preflight_method(request.method(), request.headers())?;
    let rule = state.dispatcher.preflight_rule(request, &method)?;

    ctx.rule = rule.display_name();
    ctx.served_by = ServedBy::Override;
    tracing::debug!(
        request_id = ctx.id,
        rule = ctx.rule.as_deref().unwrap_or("-"),
        method = %method,
        "Answered CORS preflight"
    );
    Some(preflight_response(&state.cors, request.headers(), rule.methods()))
}
