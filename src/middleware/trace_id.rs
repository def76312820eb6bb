//! Per-request trace id.
//!
//! Every request gets a fresh random id. It is stamped on converted log
//! records (`proxy.trace_id`), error bodies, the `X-Trace-Id` response header
//! and the request's tracing span.

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;
use tracing::Instrument;
use uuid::Uuid;

/// Response header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Request extension holding the trace id (32 lowercase hex chars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware that assigns a trace id and runs the request inside a
/// `request` span carrying it.
pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = TraceId::new();
    req.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::try_from(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    response
}
