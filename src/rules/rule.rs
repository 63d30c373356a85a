//! The rule value and its compiled matcher.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::{
    http::Method,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::future::BoxFuture;
use regex::Regex;
use serde::Serialize;

use crate::http::request::OverrideRequest;
use crate::rules::{BoxError, RuleError};

/// Boolean test over an inbound request.
pub type Predicate = Arc<dyn Fn(&OverrideRequest) -> Result<bool, BoxError> + Send + Sync>;

/// Async response producer for a matched request.
pub type Handler =
    Arc<dyn Fn(Arc<OverrideRequest>) -> BoxFuture<'static, Result<Reply, BoxError>> + Send + Sync>;

/// Wrap an async closure into a [`Handler`].
pub fn into_handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<OverrideRequest>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, BoxError>> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

/// What a handler decided to do with a matched request.
#[derive(Debug)]
pub enum Reply {
    /// Serve this response to the client.
    Respond(Response),
    /// Not handled after all; forward the request upstream.
    Continue,
}

impl Reply {
    /// Respond with anything axum can turn into a response.
    pub fn respond(response: impl IntoResponse) -> Self {
        Reply::Respond(response.into_response())
    }

    /// Respond `200 OK` with a JSON body.
    pub fn json<T: Serialize>(value: T) -> Self {
        Reply::Respond(Json(value).into_response())
    }

    /// Hand the request to the passthrough stage.
    pub fn defer() -> Self {
        Reply::Continue
    }
}

/// HTTP methods accepted by a rule, as supplied by the user.
///
/// Accepts a single value or a list; tokens are upper-cased and validated
/// when the rule is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSet(Vec<String>);

impl MethodSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Upper-case, validate and de-duplicate the method tokens.
    pub(crate) fn normalize(&self) -> Result<Vec<Method>, RuleError> {
        if self.0.is_empty() {
            return Err(RuleError::NoMethods);
        }

        let mut methods: Vec<Method> = Vec::with_capacity(self.0.len());
        for raw in &self.0 {
            let token = raw.trim().to_ascii_uppercase();
            if token.is_empty() {
                return Err(RuleError::InvalidMethod(raw.clone()));
            }
            let method = Method::from_bytes(token.as_bytes())
                .map_err(|_| RuleError::InvalidMethod(raw.clone()))?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        Ok(methods)
    }
}

impl From<&str> for MethodSet {
    fn from(method: &str) -> Self {
        Self(vec![method.to_string()])
    }
}

impl From<String> for MethodSet {
    fn from(method: String) -> Self {
        Self(vec![method])
    }
}

impl From<Method> for MethodSet {
    fn from(method: Method) -> Self {
        Self(vec![method.as_str().to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for MethodSet {
    fn from(methods: [&str; N]) -> Self {
        Self(methods.iter().map(|m| m.to_string()).collect())
    }
}

impl From<&[&str]> for MethodSet {
    fn from(methods: &[&str]) -> Self {
        Self(methods.iter().map(|m| m.to_string()).collect())
    }
}

impl From<Vec<&str>> for MethodSet {
    fn from(methods: Vec<&str>) -> Self {
        Self::from(methods.as_slice())
    }
}

impl From<Vec<String>> for MethodSet {
    fn from(methods: Vec<String>) -> Self {
        Self(methods)
    }
}

impl From<Vec<Method>> for MethodSet {
    fn from(methods: Vec<Method>) -> Self {
        Self(methods.iter().map(|m| m.as_str().to_string()).collect())
    }
}

/// Path specifier: exact string or regular expression over the request path.
#[derive(Debug, Clone)]
pub enum PathSpec {
    Exact(String),
    Regex(Regex),
}

impl PathSpec {
    /// Compile a regex path specifier.
    pub fn regex(pattern: &str) -> Result<Self, RuleError> {
        Ok(PathSpec::Regex(Regex::new(pattern)?))
    }

    /// String form used to name rules.
    pub fn label(&self) -> String {
        match self {
            PathSpec::Exact(path) => path.clone(),
            PathSpec::Regex(re) => format!("/{}/", re.as_str()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathSpec::Exact(expected) => expected == path,
            PathSpec::Regex(re) => re.is_match(path),
        }
    }
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::Exact(path.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        PathSpec::Exact(path)
    }
}

impl From<Regex> for PathSpec {
    fn from(re: Regex) -> Self {
        PathSpec::Regex(re)
    }
}

/// Compiled matching strategy of a rule.
#[derive(Clone)]
pub enum Matcher {
    ExactPath(String),
    RegexPath(Regex),
    Custom(Predicate),
}

impl Matcher {
    pub fn matches(&self, request: &OverrideRequest) -> Result<bool, BoxError> {
        match self {
            Matcher::ExactPath(path) => Ok(request.path() == path),
            Matcher::RegexPath(re) => Ok(re.is_match(request.path())),
            Matcher::Custom(test) => test(request),
        }
    }
}

impl From<PathSpec> for Matcher {
    fn from(spec: PathSpec) -> Self {
        match spec {
            PathSpec::Exact(path) => Matcher::ExactPath(path),
            PathSpec::Regex(re) => Matcher::RegexPath(re),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::ExactPath(path) => f.debug_tuple("ExactPath").field(path).finish(),
            Matcher::RegexPath(re) => f.debug_tuple("RegexPath").field(&re.as_str()).finish(),
            Matcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Where a rule came from. Display only, never used for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source: String,
    pub binding: Option<String>,
}

impl Provenance {
    pub fn new(source: impl Into<String>, binding: Option<String>) -> Self {
        Self {
            source: source.into(),
            binding,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Some(binding) => write!(f, "{}#{}", self.source, binding),
            None => f.write_str(&self.source),
        }
    }
}

/// An override rule. Immutable once built.
#[derive(Clone)]
pub struct Rule {
    name: Option<String>,
    provenance: Option<Provenance>,
    path: Option<PathSpec>,
    enabled: bool,
    methods: Vec<Method>,
    matcher: Matcher,
    handler: Handler,
}

impl Rule {
    pub(crate) fn from_parts(
        name: Option<String>,
        path: Option<PathSpec>,
        enabled: bool,
        methods: Vec<Method>,
        matcher: Matcher,
        handler: Handler,
    ) -> Self {
        Self {
            name,
            provenance: None,
            path,
            enabled,
            methods,
            matcher,
            handler,
        }
    }

    /// Tag the rule with the source it was loaded from.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Override the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Name used in logs: explicit name, then provenance, then path.
    pub fn display_name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.provenance.as_ref().map(ToString::to_string))
            .or_else(|| self.path.as_ref().map(PathSpec::label))
    }

    /// Whether this rule applies to the request.
    pub fn test(&self, request: &OverrideRequest) -> Result<bool, BoxError> {
        if !self.enabled {
            return Ok(false);
        }
        if !self.methods.contains(request.method()) {
            return Ok(false);
        }
        self.matcher.matches(request)
    }

    /// Whether a CORS preflight asking for `method` would reach this rule.
    ///
    /// Uses the declared path when there is one, since custom tests usually
    /// look at headers or bodies a preflight does not carry. Path-less rules
    /// run their test against the preflight retargeted to `method`.
    pub fn accepts_preflight(&self, preflight: &OverrideRequest, method: &Method) -> Result<bool, BoxError> {
        if !self.enabled || !self.methods.contains(method) {
            return Ok(false);
        }
        match &self.path {
            Some(path) => Ok(path.matches(preflight.path())),
            None => self
                .matcher
                .matches(&preflight.clone().with_method(method.clone())),
        }
    }

    /// Run the handler for a matched request.
    pub fn invoke(&self, request: Arc<OverrideRequest>) -> BoxFuture<'static, Result<Reply, BoxError>> {
        (self.handler)(request)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.display_name())
            .field("enabled", &self.enabled)
            .field("methods", &self.methods)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}
