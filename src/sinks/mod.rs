//! Outbound sinks for proxied telemetry.
//!
//! Every proxied request is delivered to up to two destinations:
//!
//! - **PassthroughSink** (primary): the vendor intake, receiving the original
//!   bytes unchanged. Its response is what the caller sees.
//! - **CollectorSink** (secondary): an OTLP/JSON logs collector, receiving the
//!   converted batch. Optional and observe-only.

mod collector;
mod passthrough;

use async_trait::async_trait;
use bytes::Bytes;
pub use collector::CollectorSink;
use http::{HeaderValue, StatusCode};
pub use passthrough::{ForwardedHeaders, PassthroughSink};
use url::Url;

use crate::convert::ConversionContext;

/// Everything a sink needs to deliver one proxied request.
///
/// Built once per request and shared by reference between both sinks; the
/// body is reference-counted so neither sink copies it.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Resolved intake URL (origin + forward target).
    pub target: Url,
    /// Inbound metadata allowed to reach the intake.
    pub headers: ForwardedHeaders,
    /// Raw inbound body.
    pub body: Bytes,
    pub context: ConversionContext,
}

/// A response received from a sink's destination.
#[derive(Debug, Clone)]
pub struct SinkResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Trait for outbound telemetry destinations.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver one request.
    ///
    /// An `Ok` means the sink considers the delivery complete; what counts as
    /// a failure (transport only, or non-2xx too) is up to the sink.
    async fn send(&self, delivery: &Delivery) -> Result<SinkResponse, SinkError>;

    /// Sink name for logs.
    fn name(&self) -> &'static str;
}

/// Errors from sinks.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("destination returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("destination returned {status} but its body could not be read: {source}")]
    Body {
        status: StatusCode,
        source: reqwest::Error,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The result of one sink delivery, as recorded by the dispatcher.
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: &'static str,
    pub result: Result<SinkResponse, SinkError>,
}

impl SinkOutcome {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    /// HTTP status received, or 0 when no response was received.
    pub fn status(&self) -> u16 {
        match &self.result {
            Ok(response) => response.status.as_u16(),
            Err(SinkError::Status { status, .. } | SinkError::Body { status, .. }) => {
                status.as_u16()
            }
            Err(SinkError::Request(e)) => e.status().map(|s| s.as_u16()).unwrap_or(0),
            Err(SinkError::Encode(_)) => 0,
        }
    }

    /// Failure description, if the delivery failed.
    pub fn error(&self) -> Option<String> {
        self.result.as_ref().err().map(|e| e.to_string())
    }
}

/// Read a bounded prefix of an error response body for diagnostics.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    const MAX_ERROR_BODY: usize = 512;

    match response.text().await {
        Ok(text) if text.len() > MAX_ERROR_BODY => {
            let mut end = MAX_ERROR_BODY;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &text[..end])
        }
        Ok(text) => text,
        Err(e) => format!("<unreadable body: {e}>"),
    }
}
