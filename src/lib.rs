//! Edge telemetry proxy.
//!
//! Browser SDKs point their `proxy` option at this service. Each batch is
//! forwarded byte-for-byte to the Datadog browser intake for the caller's
//! site, and a copy converted to OTLP/JSON logs is posted to an optional
//! collector at the same time. The caller only ever sees the intake's
//! answer; collector failures are logged and otherwise invisible.

pub mod config;
pub mod convert;
pub mod dispatch;
pub mod middleware;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;
pub mod routing;
pub mod sinks;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use http::{HeaderName, HeaderValue};
use tower_http::trace::TraceLayer;

use crate::{config::ProxyConfig, dispatch::Dispatcher, routing::SiteTable};

/// Shared, immutable per-process state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub dispatcher: Dispatcher,
    pub sites: Arc<SiteTable>,
    /// Precomputed CORS headers stamped on every response.
    pub cors_headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let http_client = config.server.http_client.build_client()?;
        let dispatcher = Dispatcher::from_client(http_client, config.secondary.collector());
        let sites = Arc::new(SiteTable::from_config(&config.forwarding));
        let cors_headers = Arc::new(
            config
                .server
                .cors
                .header_set()
                .map_err(StartupError::Cors)?,
        );

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            sites,
            cors_headers,
        })
    }
}

/// Errors building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid CORS configuration: {0}")]
    Cors(String),
}

/// Build the router: every request goes to the edge handler, wrapped in
/// CORS stamping, trace ids and access logging.
///
/// The body size limit is enforced by the edge handler when it reads the
/// body, so over-limit responses still pass through the CORS and trace-id
/// middleware and a disabled proxy acknowledges without reading at all.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .fallback(routes::edge_handler)
        .layer(DefaultBodyLimit::disable())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::cors_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
