//! Health check endpoint for uptime monitors.

use axum::{Json, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::AppState;

/// Service name reported by the health document.
pub const WORKER_NAME: &str = "telemetry-fanout";

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always "ok" while the process is serving.
    pub status: &'static str,
    /// RFC 3339 time of the check.
    pub timestamp: String,
    /// Configured deployment label.
    pub environment: String,
    pub worker: &'static str,
    pub version: &'static str,
    pub config: HealthConfig,
}

/// Effective forwarding configuration.
#[derive(Debug, Serialize)]
pub struct HealthConfig {
    pub forwarding_enabled: bool,
    pub secondary_sink_configured: bool,
}

impl HealthStatus {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            status: "ok",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            environment: state.config.environment.clone(),
            worker: WORKER_NAME,
            version: env!("CARGO_PKG_VERSION"),
            config: HealthConfig {
                forwarding_enabled: state.config.forwarding.enabled,
                secondary_sink_configured: state.dispatcher.has_secondary(),
            },
        }
    }
}

#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(state: &AppState) -> impl IntoResponse {
    Json(HealthStatus::from_state(state))
}
