//! Rule construction.
//!
//! Two entry points normalize user input into a [`Rule`]:
//!
//! - positional: [`Rule::route`] takes methods, a path, a handler and settings
//! - record: [`RuleSpec`] collects optional fields and validates on `build()`
//!
//! Both produce the same compiled shape: a method set, an enabled flag and a
//! [`Matcher`] evaluated by [`Rule::test`].

use std::future::Future;
use std::sync::Arc;

use axum::http::Method;

use crate::http::request::OverrideRequest;
use crate::rules::rule::{into_handler, Handler, Matcher, MethodSet, PathSpec, Predicate, Reply, Rule};
use crate::rules::{BoxError, RuleError};

/// Optional settings for the positional form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSettings {
    pub enabled: bool,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl RuleSettings {
    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}

impl Rule {
    /// Positional form: `methods`, `path`, `handler`, `settings`.
    ///
    /// `methods` must not be empty. The rule is named after the path.
    pub fn route<F, Fut>(
        methods: impl Into<MethodSet>,
        path: impl Into<PathSpec>,
        handler: F,
        settings: RuleSettings,
    ) -> Result<Rule, RuleError>
    where
        F: Fn(Arc<OverrideRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, BoxError>> + Send + 'static,
    {
        let methods = methods.into().normalize()?;
        let path = path.into();

        Ok(Rule::from_parts(
            None,
            Some(path.clone()),
            settings.enabled,
            methods,
            Matcher::from(path),
            into_handler(handler),
        ))
    }
}

/// Record form of rule construction.
///
/// ```
/// use override_proxy::rules::{BoxError, Reply, RuleSpec};
///
/// let rule = RuleSpec::new()
///     .path("/__ping")
///     .handler(|_req| async { Ok::<_, BoxError>(Reply::json(serde_json::json!({"ok": true}))) })
///     .build()
///     .unwrap();
/// assert_eq!(rule.display_name().as_deref(), Some("/__ping"));
/// ```
#[derive(Default)]
pub struct RuleSpec {
    name: Option<String>,
    path: Option<PathSpec>,
    test: Option<Predicate>,
    methods: Option<MethodSet>,
    enabled: Option<bool>,
    handler: Option<Handler>,
}

impl RuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathSpec>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Custom boolean test. Still gated by method and enabled flag.
    pub fn test<F>(self, test: F) -> Self
    where
        F: Fn(&OverrideRequest) -> bool + Send + Sync + 'static,
    {
        self.try_test(move |request| Ok(test(request)))
    }

    /// Custom test that may fail; a failure terminates dispatch with an error response.
    pub fn try_test<F>(mut self, test: F) -> Self
    where
        F: Fn(&OverrideRequest) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.test = Some(Arc::new(test));
        self
    }

    /// Methods accepted by the rule. Defaults to `GET` when omitted or empty.
    pub fn methods(mut self, methods: impl Into<MethodSet>) -> Self {
        self.methods = Some(methods.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<OverrideRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, BoxError>> + Send + 'static,
    {
        self.handler = Some(into_handler(handler));
        self
    }

    /// Use an already-boxed handler.
    pub fn boxed_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Validate and compile the rule.
    pub fn build(self) -> Result<Rule, RuleError> {
        let handler = self.handler.ok_or(RuleError::MissingHandler)?;

        let methods = match self.methods {
            Some(methods) if !methods.is_empty() => methods.normalize()?,
            _ => vec![Method::GET],
        };

        let matcher = match (self.test, &self.path) {
            (Some(test), _) => Matcher::Custom(test),
            (None, Some(path)) => Matcher::from(path.clone()),
            (None, None) => return Err(RuleError::MissingMatcher),
        };

        Ok(Rule::from_parts(
            self.name,
            self.path,
            self.enabled.unwrap_or(true),
            methods,
            matcher,
            handler,
        ))
    }
}
