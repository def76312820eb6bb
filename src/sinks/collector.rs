use async_trait::async_trait;
use http::header::CONTENT_TYPE;

use super::{Delivery, Sink, SinkError, SinkResponse, error_body};
use crate::{config::CollectorTarget, convert::convert_batch};

/// Secondary sink: converts the batch to OTLP/JSON and posts it to a
/// collector with bearer authentication.
///
/// Non-2xx responses count as failures.
pub struct CollectorSink {
    client: reqwest::Client,
    target: CollectorTarget,
}

impl CollectorSink {
    pub fn new(client: reqwest::Client, target: CollectorTarget) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl Sink for CollectorSink {
    async fn send(&self, delivery: &Delivery) -> Result<SinkResponse, SinkError> {
        let payload = convert_batch(&delivery.body, &delivery.context);
        let records = payload.log_records().count();
        let body = serde_json::to_vec(&payload)?;

        let response = self
            .client
            .post(self.target.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.target.token)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                status,
                body: error_body(response).await,
            });
        }

        tracing::debug!(
            records,
            status = status.as_u16(),
            "Collector accepted converted batch"
        );

        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        Ok(SinkResponse {
            status,
            content_type,
            body: response.bytes().await?,
        })
    }

    fn name(&self) -> &'static str {
        "secondary"
    }
}
