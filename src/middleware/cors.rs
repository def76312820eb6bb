//! CORS header stamping.
//!
//! The proxy answers browsers on arbitrary origins, so the configured CORS
//! header set is stamped onto every response: proxied intake responses,
//! errors, health checks and preflights alike. Preflights themselves are
//! answered by the edge handler.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::AppState;

/// Middleware that adds the configured CORS headers to all responses.
pub async fn cors_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in state.cors_headers.iter() {
        headers.insert(name.clone(), value.clone());
    }

    response
}
