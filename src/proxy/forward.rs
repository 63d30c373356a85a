//! Passthrough to the upstream origin.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream base URL
//! - Prepare headers (hop-by-hop, X-Forwarded-*, Host)
//! - Relay the upstream response unchanged
//! - Map transport failures to 502 / 504 JSON errors
//!
//! # Design Decisions
//! - Error bodies never carry upstream internals; details go to the log
//! - Response bodies are streamed, not buffered

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, uri::PathAndQuery, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::http::response::{error_response, PROXY_ERROR};
use crate::proxy::headers::{add_forwarded, strip_hop_by_hop};

/// Invalid upstream configuration.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },
}

/// Reverse-proxy transport to a single upstream origin.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    target: Uri,
    base_path: String,
    change_origin: bool,
    forwarded_headers: bool,
    timeout: Duration,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig, timeout: Duration) -> Result<Self, UpstreamError> {
        let invalid = |reason: &str| UpstreamError::InvalidTarget {
            target: config.target.clone(),
            reason: reason.to_string(),
        };

        let target: Uri = config.target.parse().map_err(|_| invalid("not a URL"))?;
        if target.scheme_str() != Some("http") {
            return Err(invalid("only http:// targets are supported"));
        }
        if target.authority().is_none() {
            return Err(invalid("missing host"));
        }
        let base_path = target.path().trim_end_matches('/').to_string();

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            target,
            base_path,
            change_origin: config.change_origin,
            forwarded_headers: config.forwarded_headers,
            timeout,
        })
    }

    /// Upstream URI for an inbound request URI.
    pub fn target_uri(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = original
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");
        let joined = format!("{}{}", self.base_path, path_and_query);

        let mut parts = self.target.clone().into_parts();
        parts.path_and_query = Some(joined.parse()?);
        Ok(Uri::from_parts(parts)?)
    }

    /// Forward a request and relay the response.
    pub async fn forward(&self, mut request: Request<Body>) -> Response {
        let uri = match self.target_uri(request.uri()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(uri = %request.uri(), error = %e, "Cannot map request onto upstream");
                return error_response(StatusCode::BAD_REQUEST, PROXY_ERROR, "request URI cannot be forwarded");
            }
        };

        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let headers = request.headers_mut();
        strip_hop_by_hop(headers);
        if self.forwarded_headers {
            add_forwarded(headers, client_ip);
        }
        if self.change_origin {
            if let Some(authority) = self.target.authority() {
                if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                    headers.insert(header::HOST, host);
                }
            }
        }
        *request.uri_mut() = uri;

        tracing::debug!(upstream = %request.uri(), "Forwarding request");

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body)).into_response()
            }
            Ok(Err(e)) => {
                tracing::error!(upstream = %self.target, error = %e, "Upstream error");
                error_response(
                    StatusCode::BAD_GATEWAY,
                    PROXY_ERROR,
                    format!("upstream {} is unavailable", self.authority()),
                )
            }
            Err(_) => {
                tracing::error!(upstream = %self.target, timeout = ?self.timeout, "Upstream timed out");
                error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    PROXY_ERROR,
                    format!("upstream {} did not respond in time", self.authority()),
                )
            }
        }
    }

    fn authority(&self) -> &str {
        self.target.authority().map(|a| a.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(target: &str) -> Upstream {
        let config = UpstreamConfig {
            target: target.to_string(),
            ..UpstreamConfig::default()
        };
        Upstream::new(&config, Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_target_uri_joins_base_path() {
        let root = upstream("http://127.0.0.1:3000");
        let uri = root.target_uri(&"/api/users?page=2".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/api/users?page=2");

        let nested = upstream("http://127.0.0.1:3000/v1/");
        let uri = nested.target_uri(&"/users".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/v1/users");
    }

    #[test]
    fn test_rejects_unsupported_targets() {
        let https = UpstreamConfig {
            target: "https://example.com".into(),
            ..UpstreamConfig::default()
        };
        assert!(Upstream::new(&https, Duration::from_secs(1)).is_err());

        let relative = UpstreamConfig {
            target: "/api".into(),
            ..UpstreamConfig::default()
        };
        assert!(Upstream::new(&relative, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        // Nothing listens on port 9 (discard) on a test machine.
        let upstream = upstream("http://127.0.0.1:9");
        let request = Request::builder().uri("/x").body(Body::empty()).unwrap();

        let response = upstream.forward(request).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "proxy_error");
        assert_eq!(body["detail"], "upstream 127.0.0.1:9 is unavailable");
    }
}
