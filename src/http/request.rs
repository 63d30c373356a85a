//! Buffered view of an inbound request.
//!
//! # Responsibilities
//! - Buffer the request body once so every predicate and handler can read it
//! - Expose routing-relevant information (method, path, query, headers)
//! - Rebuild a forwardable request when no override applies
//!
//! # Design Decisions
//! - Path excludes the query string; matching never sees `?...`
//! - Shared as `Arc<OverrideRequest>` so async handlers own their input
//! - Extensions (connect info, request id) stay with the middleware, not here
//! - A body limit of 0 buffers without limit; the limit also applies to
//!   requests that end up forwarded, since buffering happens before dispatch

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::Query,
    http::{HeaderMap, Method, Request, Uri, Version},
};
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Header carrying the request id assigned by the request-id layer.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Failure to buffer a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(axum::Error),
}

impl BodyError {
    fn classify(error: axum::Error, limit: usize) -> Self {
        let inner = error.into_inner();
        if inner.downcast_ref::<LengthLimitError>().is_some() {
            BodyError::TooLarge { limit }
        } else {
            BodyError::Read(axum::Error::new(inner))
        }
    }
}

/// An inbound request with its body fully buffered.
#[derive(Debug, Clone)]
pub struct OverrideRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl OverrideRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Buffer an axum request, returning the buffered view and the leftover extensions.
    ///
    /// `max_body_bytes == 0` means no limit.
    pub async fn from_request(
        request: Request<Body>,
        max_body_bytes: usize,
    ) -> Result<(Self, axum::http::Extensions), BodyError> {
        let limit = if max_body_bytes == 0 { usize::MAX } else { max_body_bytes };
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| BodyError::classify(e, max_body_bytes))?;

        let request = Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
        };
        Ok((request, parts.extensions))
    }

    /// Builder-style header insertion. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_bytes()),
            axum::http::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Builder-style method replacement.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Builder-style body replacement.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decoded query parameters. Malformed query strings yield an empty map.
    pub fn query(&self) -> HashMap<String, String> {
        Query::<HashMap<String, String>>::try_from_uri(&self.uri)
            .map(|Query(params)| params)
            .unwrap_or_default()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Rebuild a forwardable request, restoring the extensions taken by `from_request`.
    pub fn to_request(&self, extensions: axum::http::Extensions) -> Request<Body> {
        let mut request = Request::new(Body::from(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        *request.extensions_mut() = extensions;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_excludes_query() {
        let req = OverrideRequest::new(Method::GET, "/api/users?page=2&q=a%20b".parse().unwrap());
        assert_eq!(req.path(), "/api/users");

        let query = req.query();
        assert_eq!(query.get("page").map(String::as_str), Some("2"));
        assert_eq!(query.get("q").map(String::as_str), Some("a b"));
    }

    #[test]
    fn test_header_and_json_body() {
        let req = OverrideRequest::new(Method::POST, "/login".parse().unwrap())
            .with_header("X-Scenario", "locked")
            .with_body(r#"{"user":"ana"}"#);

        assert_eq!(req.header("x-scenario"), Some("locked"));
        let body: serde_json::Value = req.json().unwrap();
        assert_eq!(body["user"], "ana");
    }

    #[tokio::test]
    async fn test_buffer_and_rebuild_roundtrip() {
        let original = Request::builder()
            .method(Method::PUT)
            .uri("/items/7?force=1")
            .header("content-type", "application/json")
            .body(Body::from("{\"n\":7}"))
            .unwrap();

        let (buffered, extensions) = OverrideRequest::from_request(original, 1024).await.unwrap();
        assert_eq!(buffered.body().as_ref(), b"{\"n\":7}");

        let rebuilt = buffered.to_request(extensions);
        assert_eq!(rebuilt.method(), Method::PUT);
        assert_eq!(rebuilt.uri().path_and_query().unwrap().as_str(), "/items/7?force=1");
        let bytes = axum::body::to_bytes(rebuilt.into_body(), 1024).await.unwrap();
        assert_eq!(bytes.as_ref(), b"{\"n\":7}");
    }

    #[tokio::test]
    async fn test_body_limit_rejected() {
        let original = Request::builder()
            .uri("/upload")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();

        let err = OverrideRequest::from_request(original, 16).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_zero_limit_buffers_everything() {
        let original = Request::builder()
            .uri("/upload")
            .body(Body::from(vec![7u8; 64 * 1024]))
            .unwrap();

        let (buffered, _) = OverrideRequest::from_request(original, 0).await.unwrap();
        assert_eq!(buffered.body().len(), 64 * 1024);
    }

    #[tokio::test]
    async fn test_broken_body_is_read_error() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let original = Request::builder()
            .uri("/upload")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let err = OverrideRequest::from_request(original, 1024).await.unwrap_err();
        assert!(matches!(err, BodyError::Read(_)));
    }
}
