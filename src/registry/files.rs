//! Declarative rule files.
//!
//! Every `*.toml` file in the overrides directory is one source. Files are
//! discovered in file-name order; rules keep their order within a file.
//!
//! ```toml
//! [[rule]]
//! name = "user by id"
//! methods = ["GET", "HEAD"]
//! path_regex = '^/api/users/(\d+)$'
//! delay_ms = 150
//!
//! [rule.when]
//! headers = { "x-scenario" = "happy" }
//!
//! [rule.response]
//! status = 200
//! json = { id = 42, name = "Ada" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use serde::Deserialize;

use crate::http::request::OverrideRequest;
use crate::registry::source::{RuleSource, SourceError};
use crate::rules::{BoxError, PathSpec, Reply, Rule, RuleSpec};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(method) => vec![method],
            OneOrMany::Many(methods) => methods,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDecl {
    name: Option<String>,
    methods: Option<OneOrMany>,
    path: Option<String>,
    path_regex: Option<String>,
    enabled: Option<bool>,
    delay_ms: Option<u64>,
    when: Option<WhenDecl>,
    #[serde(default)]
    response: ResponseDecl,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WhenDecl {
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    query: BTreeMap<String, String>,
    body_contains: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResponseDecl {
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    json: Option<serde_json::Value>,
    body: Option<String>,
    file: Option<PathBuf>,
}

impl Default for ResponseDecl {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: BTreeMap::new(),
            json: None,
            body: None,
            file: None,
        }
    }
}

fn default_status() -> u16 {
    200
}

/// Canned response served by a file rule.
#[derive(Debug)]
struct StaticResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl StaticResponse {
    fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Extra request conditions of a file rule, including its path.
#[derive(Debug)]
struct Conditions {
    path: Option<PathSpec>,
    headers: Vec<(HeaderName, String)>,
    query: Vec<(String, String)>,
    body_contains: Option<String>,
}

impl Conditions {
    fn matches(&self, request: &OverrideRequest) -> bool {
        if let Some(path) = &self.path {
            if !path.matches(request.path()) {
                return false;
            }
        }

        let headers_match = self.headers.iter().all(|(name, expected)| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected)
        });
        if !headers_match {
            return false;
        }

        if !self.query.is_empty() {
            let query = request.query();
            let query_match = self
                .query
                .iter()
                .all(|(key, expected)| query.get(key).is_some_and(|v| v == expected));
            if !query_match {
                return false;
            }
        }

        match &self.body_contains {
            Some(needle) => String::from_utf8_lossy(request.body()).contains(needle.as_str()),
            None => true,
        }
    }
}

/// One rule file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for FileSource {
    fn label(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn rules(&self) -> Result<Vec<Rule>, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_rules(&self.path, &content)
    }
}

/// List the `*.toml` rule files of a directory, sorted by file name.
pub fn discover_dir(dir: &Path) -> Result<Vec<FileSource>, std::io::Error> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths.into_iter().map(FileSource::new).collect())
}

/// Parse the content of a rule file located at `path`.
///
/// Relative `response.file` entries resolve against the file's directory.
pub fn parse_rules(path: &Path, content: &str) -> Result<Vec<Rule>, SourceError> {
    let file: RuleFile = toml::from_str(content).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    file.rules
        .into_iter()
        .enumerate()
        .map(|(index, decl)| build_rule(format!("rule[{}]", index), decl, base_dir))
        .collect()
}

fn build_rule(binding: String, decl: RuleDecl, base_dir: &Path) -> Result<Rule, SourceError> {
    let path = match (decl.path, decl.path_regex) {
        (Some(_), Some(_)) => {
            return Err(SourceError::Invalid {
                binding,
                reason: "path and path_regex are mutually exclusive".to_string(),
            })
        }
        (Some(path), None) => Some(PathSpec::from(path)),
        (None, Some(pattern)) => Some(PathSpec::regex(&pattern).map_err(|source| SourceError::Rule {
            binding: binding.clone(),
            source,
        })?),
        (None, None) => None,
    };

    let response = Arc::new(static_response(&binding, decl.response, base_dir)?);
    let delay = decl.delay_ms.map(Duration::from_millis);

    let mut spec = RuleSpec::new()
        .enabled(decl.enabled.unwrap_or(true))
        .handler(move |_req| {
            let response = response.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, BoxError>(Reply::Respond(response.to_response()))
            }
        });

    if let Some(name) = decl.name {
        spec = spec.name(name);
    }
    if let Some(methods) = decl.methods {
        spec = spec.methods(methods.into_vec());
    }
    if let Some(path) = &path {
        spec = spec.path(path.clone());
    }
    if let Some(when) = decl.when {
        let conditions = conditions(&binding, when, path)?;
        spec = spec.test(move |request| conditions.matches(request));
    }

    spec.build().map_err(|source| SourceError::Rule { binding, source })
}

fn conditions(binding: &str, when: WhenDecl, path: Option<PathSpec>) -> Result<Conditions, SourceError> {
    let headers = when
        .headers
        .into_iter()
        .map(|(name, value)| {
            HeaderName::from_bytes(name.as_bytes())
                .map(|name| (name, value))
                .map_err(|_| invalid(binding, format!("invalid header name in when: {:?}", name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Conditions {
        path,
        headers,
        query: when.query.into_iter().collect(),
        body_contains: when.body_contains,
    })
}

fn static_response(binding: &str, decl: ResponseDecl, base_dir: &Path) -> Result<StaticResponse, SourceError> {
    let status = StatusCode::from_u16(decl.status)
        .map_err(|_| invalid(binding, format!("invalid status code {}", decl.status)))?;

    let mut headers = HeaderMap::new();
    let body = match (decl.json, decl.body, decl.file) {
        (Some(json), None, None) => {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let bytes = serde_json::to_vec(&json)
                .map_err(|e| invalid(binding, format!("unserializable json body: {}", e)))?;
            Bytes::from(bytes)
        }
        (None, Some(text), None) => {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
            Bytes::from(text)
        }
        (None, None, Some(file)) => {
            let path = base_dir.join(file);
            headers.insert(header::CONTENT_TYPE, content_type_for(&path));
            let bytes = fs::read(&path).map_err(|source| SourceError::Io { path, source })?;
            Bytes::from(bytes)
        }
        (None, None, None) => Bytes::new(),
        _ => {
            return Err(invalid(
                binding,
                "response accepts only one of json, body or file".to_string(),
            ))
        }
    };

    for (name, value) in decl.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| invalid(binding, format!("invalid response header name: {:?}", name)))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|_| invalid(binding, format!("invalid value for response header {:?}", name)))?;
        headers.insert(header_name, header_value);
    }

    Ok(StaticResponse { status, headers, body })
}

fn content_type_for(path: &Path) -> HeaderValue {
    let content_type = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        _ => "application/octet-stream",
    };
    HeaderValue::from_static(content_type)
}

fn invalid(binding: &str, reason: String) -> SourceError {
    SourceError::Invalid {
        binding: binding.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Uri};

    fn request(method: Method, uri: &str) -> OverrideRequest {
        OverrideRequest::new(method, uri.parse::<Uri>().unwrap())
    }

    fn parse(content: &str) -> Result<Vec<Rule>, SourceError> {
        parse_rules(Path::new("overrides/users.toml"), content)
    }

    async fn serve(rule: &Rule, req: OverrideRequest) -> (StatusCode, HeaderMap, Bytes) {
        let Reply::Respond(response) = rule.invoke(Arc::new(req)).await.unwrap() else {
            panic!("file rules always respond");
        };
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_json_rule() {
        let rules = parse(
            r#"
            [[rule]]
            name = "me"
            path = "/api/me"
            [rule.response]
            status = 201
            headers = { "x-mock" = "1" }
            json = { id = 1, name = "Ada" }
            "#,
        )
        .unwrap();

        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.display_name().as_deref(), Some("me"));
        assert!(rule.test(&request(Method::GET, "/api/me")).unwrap());
        assert!(!rule.test(&request(Method::POST, "/api/me")).unwrap());

        let (status, headers, body) = serve(rule, request(Method::GET, "/api/me")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers.get("x-mock").unwrap(), "1");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({"id": 1, "name": "Ada"}));
    }

    #[test]
    fn test_methods_string_or_list() {
        let rules = parse(
            r#"
            [[rule]]
            methods = "post"
            path = "/a"

            [[rule]]
            methods = ["put", "DELETE"]
            path_regex = '^/b/\d+$'
            "#,
        )
        .unwrap();

        assert!(rules[0].test(&request(Method::POST, "/a")).unwrap());
        assert!(!rules[0].test(&request(Method::GET, "/a")).unwrap());
        assert!(rules[1].test(&request(Method::DELETE, "/b/9")).unwrap());
        assert!(!rules[1].test(&request(Method::DELETE, "/b/x")).unwrap());
    }

    #[test]
    fn test_when_conditions_combine_with_path() {
        let rules = parse(
            r#"
            [[rule]]
            methods = ["GET", "POST"]
            path = "/cart"
            [rule.when]
            headers = { "x-scenario" = "empty" }
            query = { page = "2" }
            body_contains = "sku"
            "#,
        )
        .unwrap();
        let rule = &rules[0];

        let hit = request(Method::POST, "/cart?page=2")
            .with_header("x-scenario", "empty")
            .with_body("{\"sku\":1}");
        assert!(rule.test(&hit).unwrap());

        let wrong_path = request(Method::POST, "/basket?page=2")
            .with_header("x-scenario", "empty")
            .with_body("{\"sku\":1}");
        assert!(!rule.test(&wrong_path).unwrap());

        let missing_header = request(Method::POST, "/cart?page=2").with_body("{\"sku\":1}");
        assert!(!rule.test(&missing_header).unwrap());

        let wrong_query = request(Method::POST, "/cart?page=3")
            .with_header("x-scenario", "empty")
            .with_body("{\"sku\":1}");
        assert!(!rule.test(&wrong_query).unwrap());
    }

    #[test]
    fn test_when_without_path_is_test_rule() {
        let rules = parse(
            r#"
            [[rule]]
            [rule.when]
            headers = { "x-fail" = "yes" }
            [rule.response]
            status = 503
            "#,
        )
        .unwrap();

        assert!(rules[0].test(&request(Method::GET, "/any/path").with_header("x-fail", "yes")).unwrap());
        assert!(!rules[0].test(&request(Method::GET, "/any/path")).unwrap());
        assert_eq!(rules[0].display_name(), None);
    }

    #[test]
    fn test_disabled_file_rule() {
        let rules = parse(
            r#"
            [[rule]]
            path = "/x"
            enabled = false
            "#,
        )
        .unwrap();
        assert!(!rules[0].test(&request(Method::GET, "/x")).unwrap());
    }

    #[test]
    fn test_rule_without_matcher_fails_source() {
        let err = parse(
            r#"
            [[rule]]
            path = "/ok"

            [[rule]]
            name = "orphan"
            "#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "rule[1]: rule requires either path or test");
    }

    #[test]
    fn test_invalid_declarations() {
        let both = parse("[[rule]]\npath = \"/a\"\npath_regex = \"^/a$\"\n").unwrap_err();
        assert!(matches!(both, SourceError::Invalid { .. }));

        let status = parse("[[rule]]\npath = \"/a\"\n[rule.response]\nstatus = 1000\n").unwrap_err();
        assert!(matches!(status, SourceError::Invalid { .. }));

        let bodies = parse("[[rule]]\npath = \"/a\"\n[rule.response]\nbody = \"x\"\njson = 1\n").unwrap_err();
        assert!(matches!(bodies, SourceError::Invalid { .. }));

        let regex = parse("[[rule]]\npath_regex = \"(\"\n").unwrap_err();
        assert!(matches!(regex, SourceError::Rule { .. }));

        let unknown = parse("[[rule]]\npath = \"/a\"\nstatus = 200\n").unwrap_err();
        assert!(matches!(unknown, SourceError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_delay_is_applied() {
        let rules = parse(
            r#"
            [[rule]]
            path = "/slow"
            delay_ms = 50
            [rule.response]
            body = "late"
            "#,
        )
        .unwrap();

        let start = std::time::Instant::now();
        let (_, headers, body) = serve(&rules[0], request(Method::GET, "/slow")).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(body.as_ref(), b"late");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn test_discover_dir_sorted_and_file_body() {
        let dir = std::env::temp_dir().join(format!("override-proxy-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.toml"), "[[rule]]\npath = \"/b\"\n").unwrap();
        fs::write(
            dir.join("a.toml"),
            "[[rule]]\npath = \"/a\"\n[rule.response]\nfile = \"a.json\"\n",
        )
        .unwrap();
        fs::write(dir.join("a.json"), "{\"from\":\"file\"}").unwrap();
        fs::write(dir.join("notes.md"), "ignored").unwrap();

        let sources = discover_dir(&dir).unwrap();
        let labels: Vec<_> = sources.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["a", "b"]);

        let rules = sources[0].rules().unwrap();
        let (_, headers, body) = serve(&rules[0], request(Method::GET, "/a")).await;
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(body.as_ref(), b"{\"from\":\"file\"}");

        fs::remove_dir_all(&dir).unwrap();
    }
}
