//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the axum router from the [`RouteTable`]
//! - Wire up middleware (request ID, tracing, timeout, body limit, headers)
//! - Serve on a listener until shutdown
//! - Swap in a rebuilt pipeline whenever the configuration changes

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwap;
use thiserror::Error;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::request;
use crate::config::ServiceConfig;
use crate::observability::metrics;
use crate::pipeline::{DefaultPipeline, FetchError};
use crate::routing::RouteTable;
use crate::security::{headers, limits};

/// Server construction and runtime failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build transform pipeline: {0}")]
    Pipeline(#[from] FetchError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current pipeline; replaced wholesale on config reload.
    pub pipeline: Arc<ArcSwap<DefaultPipeline>>,
    pub started: Instant,
    pub started_at: SystemTime,
}

impl AppState {
    pub fn new(pipeline: DefaultPipeline) -> Self {
        Self {
            pipeline: Arc::new(ArcSwap::from_pointee(pipeline)),
            started: Instant::now(),
            started_at: SystemTime::now(),
        }
    }
}

/// HTTP server for the image transform service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server with the default route table.
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        Self::with_routes(config, RouteTable::new())
    }

    pub fn with_routes(config: ServiceConfig, routes: RouteTable) -> Result<Self, ServerError> {
        let state = AppState::new(DefaultPipeline::from_config(&config)?);
        let router = Self::build_router(&config, routes, state.clone());
        Ok(Self { router, state })
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, routes: RouteTable, state: AppState) -> Router {
        let mut router = routes
            .into_router()
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state);

        if config.security.enable_headers {
            router = router.layer(headers::nosniff_layer());
        }

        router.layer(
            ServiceBuilder::new()
                .layer(request::set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(request::make_span))
                .layer(request::propagate_request_id_layer())
                .layer(limits::body_limit_layer(&config.security))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Each config received on `config_updates` rebuilds the pipeline; a
    /// config that fails to build keeps the current one.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloader = tokio::spawn(apply_config_updates(
            Arc::clone(&self.state.pipeline),
            config_updates,
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_config_updates(
    pipeline: Arc<ArcSwap<DefaultPipeline>>,
    mut updates: mpsc::UnboundedReceiver<ServiceConfig>,
) {
    while let Some(config) = updates.recv().await {
        match DefaultPipeline::from_config(&config) {
            Ok(next) => {
                pipeline.store(Arc::new(next));
                tracing::info!("Transform pipeline rebuilt from new configuration");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to rebuild pipeline, keeping current one");
            }
        }
    }
}

/// Record request count and latency per matched route.
async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_name_the_failing_stage() {
        let err = ServerError::from(FetchError::Request("no TLS backend".into()));
        assert!(matches!(err, ServerError::Pipeline(_)));
        assert!(err.to_string().starts_with("failed to build transform pipeline"));

        let err = ServerError::from(std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken"));
        assert!(matches!(err, ServerError::Io(_)));
    }

    #[test]
    fn test_with_routes_builds_from_default_config() {
        assert!(HttpServer::with_routes(ServiceConfig::default(), RouteTable::empty()).is_ok());
    }
}
