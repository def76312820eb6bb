//! Edge handler: the single entry point for every inbound request.

use std::net::SocketAddr;

use axum::{
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
};
use http::{StatusCode, header::CONTENT_TYPE, request::Parts};
use http_body_util::LengthLimitError;

use super::{ProxyError, health::health_check};
use crate::{
    AppState,
    convert::ConversionContext,
    middleware::{TraceId, client_ip},
    routing::{RouteClass, classify, validate_forward_target},
    sinks::{Delivery, ForwardedHeaders, SinkOutcome},
};

/// Classify the request and answer it.
///
/// Preflights get an empty 204, `/health` the health document, proxy
/// requests are fanned out to both sinks, and everything else is a 404.
/// CORS and trace headers are added by middleware.
pub async fn edge_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let trace_id = parts
        .extensions
        .get::<TraceId>()
        .cloned()
        .unwrap_or_default();

    match classify(&parts.method, &parts.uri) {
        RouteClass::Preflight => StatusCode::NO_CONTENT.into_response(),
        RouteClass::Health => health_check(&state).await.into_response(),
        RouteClass::Proxy { target } => {
            match proxy(&state, &parts, body, &target, &trace_id).await {
                Ok(response) => response,
                Err(e) => e.traced(&trace_id).into_response(),
            }
        }
        RouteClass::NotFound => ProxyError::NotFound {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
        }
        .traced(&trace_id)
        .into_response(),
    }
}

async fn proxy(
    state: &AppState,
    parts: &Parts,
    body: Body,
    target: &str,
    trace_id: &TraceId,
) -> Result<Response, ProxyError> {
    let target = validate_forward_target(target)?;
    let site = state.sites.select_site(parts.uri.query(), &parts.headers);
    let url = state.sites.intake_url(&site, target).inspect_err(|e| {
        tracing::error!(site = %site, error = %e, "Cannot resolve intake origin");
    })?;

    if !state.config.forwarding.enabled {
        tracing::debug!(site = %site, "Forwarding disabled, acknowledging without delivery");
        return Ok((StatusCode::OK, "OK").into_response());
    }

    let limit = state.config.server.body_limit_bytes;
    let body = to_bytes(body, limit)
        .await
        .map_err(|e| body_error(e, limit))?;

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let delivery = Delivery {
        target: url,
        headers: ForwardedHeaders::from_inbound(&parts.headers, client_ip(&parts.headers, peer)),
        body,
        context: ConversionContext::new(trace_id.as_str()),
    };

    tracing::debug!(
        site = %site,
        target = %delivery.target,
        bytes = delivery.body.len(),
        "Dispatching telemetry"
    );

    let report = state.dispatcher.dispatch(&delivery).await;
    primary_response(report.primary)
}

/// Over-limit bodies are a 413; any other read failure (client abort,
/// transport error) is a 400.
fn body_error(error: axum::Error, limit: usize) -> ProxyError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&error);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return ProxyError::PayloadTooLarge(limit);
        }
        source = e.source();
    }
    tracing::warn!(error = %error, "Failed to read request body");
    ProxyError::BodyRead(error.to_string())
}

/// Caller-facing response: the intake's status, content type and body
/// verbatim, or a 500 when no response was received.
fn primary_response(outcome: SinkOutcome) -> Result<Response, ProxyError> {
    let upstream = outcome
        .result
        .map_err(|e| ProxyError::PrimarySink(e.to_string()))?;

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    if let Some(content_type) = upstream.content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_over_limit_body_is_payload_too_large() {
        let err = to_bytes(Body::from(vec![b'x'; 64]), 16).await.unwrap_err();
        assert!(matches!(
            body_error(err, 16),
            ProxyError::PayloadTooLarge(16)
        ));
    }

    #[test]
    fn test_transport_failure_is_bad_request() {
        let err = axum::Error::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ));
        let mapped = body_error(err, 16);
        assert!(matches!(mapped, ProxyError::BodyRead(_)));
        assert_eq!(mapped.status(), StatusCode::BAD_REQUEST);
    }
}
