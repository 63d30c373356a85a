//! CORS headers for override responses.
//!
//! Upstream responses are relayed verbatim; only responses produced by
//! override rules get CORS headers, so a browser app can call mocked
//! endpoints from its dev-server origin. Preflights for methods an override
//! serves are answered here too, since the upstream usually has no such route.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::Response,
};

use crate::config::CorsConfig;

/// Add CORS headers to an override response. Headers set by the handler win.
pub fn apply_cors(config: &CorsConfig, request_headers: &HeaderMap, response_headers: &mut HeaderMap) {
    if !config.enabled || response_headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN) {
        return;
    }

    let origin = match &config.allow_origin {
        Some(origin) => HeaderValue::from_str(origin).ok(),
        None => request_headers.get(header::ORIGIN).cloned(),
    };

    match origin {
        Some(origin) if origin != "*" => {
            response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            response_headers.append(header::VARY, HeaderValue::from_static("Origin"));
            if config.allow_credentials {
                response_headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
            }
        }
        _ => {
            response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
    }

    if !response_headers.contains_key(header::ACCESS_CONTROL_EXPOSE_HEADERS) {
        response_headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("*"));
    }
}

/// The method a CORS preflight asks about.
///
/// `None` unless the request is `OPTIONS` with both `Origin` and
/// `Access-Control-Request-Method`.
pub fn preflight_method(method: &Method, request_headers: &HeaderMap) -> Option<Method> {
    if *method != Method::OPTIONS || !request_headers.contains_key(header::ORIGIN) {
        return None;
    }
    let requested = request_headers
        .get(header::ACCESS_CONTROL_REQUEST_METHOD)?
        .to_str()
        .ok()?
        .trim()
        .to_ascii_uppercase();
    Method::from_bytes(requested.as_bytes()).ok()
}

/// `204` preflight answer allowing `methods` and the requested headers.
pub fn preflight_response(config: &CorsConfig, request_headers: &HeaderMap, methods: &[Method]) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;

    let headers = response.headers_mut();
    apply_cors(config, request_headers, headers);

    let allow_methods = methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow_methods) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
    }
    if let Some(requested) = request_headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        headers.append(header::VARY, HeaderValue::from_static("Access-Control-Request-Headers"));
    }
    headers.append(header::VARY, HeaderValue::from_static("Access-Control-Request-Method"));

    response
}
