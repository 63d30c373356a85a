//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: override middleware in front of the passthrough fallback
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{CorsConfig, ProxyConfig};
use crate::dispatch::Dispatcher;
use crate::http::middleware::override_middleware;
use crate::proxy::{Upstream, UpstreamError};
use crate::registry::SharedRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub upstream: Upstream,
    pub cors: Arc<CorsConfig>,
    pub max_body_bytes: usize,
    /// Source of per-request sequence numbers.
    pub sequence: Arc<AtomicU64>,
}

/// HTTP server for the override proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving rules from `registry`.
    pub fn new(config: ProxyConfig, registry: SharedRegistry) -> Result<Self, UpstreamError> {
        let upstream = Upstream::new(
            &config.upstream,
            Duration::from_secs(config.timeouts.upstream_secs),
        )?;

        let dispatcher = Dispatcher::new(registry).with_handler_timeout(
            config.overrides.handler_timeout_ms.map(Duration::from_millis),
        );

        let state = AppState {
            dispatcher,
            upstream,
            cors: Arc::new(config.cors.clone()),
            max_body_bytes: config.listener.max_body_bytes,
            sequence: Arc::new(AtomicU64::new(0)),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .layer(middleware::from_fn_with_state(state.clone(), override_middleware))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.target,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Passthrough handler. Only reached when no override handled the request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.upstream.forward(request).await
}
