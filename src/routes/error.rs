use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;

use crate::{middleware::TraceId, routing::RoutingError};

/// Errors surfaced to the caller by the edge handler.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Unknown site '{0}'")]
    UnknownSite(String),

    #[error("Invalid forward target '{0}': must be an absolute path")]
    InvalidForwardTarget(String),

    #[error("Intake forwarding failed: {0}")]
    PrimarySink(String),

    #[error("No route for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("Request body exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Request body could not be read: {0}")]
    BodyRead(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownSite(_) | Self::PrimarySink(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidForwardTarget(_) | Self::BodyRead(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownSite(_) => "unknown_site",
            Self::InvalidForwardTarget(_) => "invalid_forward_target",
            Self::PrimarySink(_) => "primary_sink_failed",
            Self::NotFound { .. } => "not_found",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::BodyRead(_) => "body_read_failed",
        }
    }

    /// Attach the request's trace id for the response body.
    pub fn traced(self, trace_id: &TraceId) -> TracedError {
        TracedError {
            error: self,
            trace_id: trace_id.to_string(),
        }
    }
}

impl From<RoutingError> for ProxyError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::UnknownSite(site) => Self::UnknownSite(site),
            RoutingError::InvalidForwardTarget(target) => Self::InvalidForwardTarget(target),
        }
    }
}

/// A [`ProxyError`] paired with the trace id of the failing request.
#[derive(Debug)]
pub struct TracedError {
    pub error: ProxyError,
    pub trace_id: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
    trace_id: &'a str,
}

impl IntoResponse for TracedError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error.code(),
                message: self.error.to_string(),
                trace_id: &self.trace_id,
            },
        };
        (self.error.status(), Json(body)).into_response()
    }
}
