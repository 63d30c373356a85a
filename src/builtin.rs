//! Rules compiled into the proxy.

use serde_json::json;

use crate::registry::RuleSet;
use crate::rules::{BoxError, Reply, RuleSpec};

/// Path of the liveness rule.
pub const PING_PATH: &str = "/__ping";

/// `GET /__ping` → `{"ok": true}`, answered without touching the upstream.
pub fn builtin_rules() -> RuleSet {
    RuleSet::new("builtin").named("ping", || {
        RuleSpec::new()
            .name("__ping")
            .methods("GET")
            .path(PING_PATH)
            .handler(|_req| async { Ok::<_, BoxError>(Reply::json(json!({ "ok": true }))) })
            .build()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::OverrideRequest;
    use crate::registry::RuleSource;
    use axum::http::Method;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ping_rule() {
        let rules = builtin_rules().rules().unwrap();
        assert_eq!(rules.len(), 1);

        let rule = &rules[0];
        assert_eq!(rule.display_name().as_deref(), Some("__ping"));

        let get = OverrideRequest::new(Method::GET, "/__ping".parse().unwrap());
        let post = OverrideRequest::new(Method::POST, "/__ping".parse().unwrap());
        assert!(rule.test(&get).unwrap());
        assert!(!rule.test(&post).unwrap());

        match rule.invoke(Arc::new(get)).await.unwrap() {
            Reply::Respond(response) => {
                let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
                let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(body, json!({"ok": true}));
            }
            Reply::Continue => panic!("ping should respond"),
        }
    }
}
