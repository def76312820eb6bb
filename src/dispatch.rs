//! Dual-sink dispatch.
//!
//! The primary and secondary sinks run concurrently for every proxied
//! request. Each delivery resolves to a [`SinkOutcome`] rather than an error,
//! so one sink failing never cancels or delays the other; the join waits for
//! both.

use std::{sync::Arc, time::Instant};

use crate::{
    config::CollectorTarget,
    sinks::{CollectorSink, Delivery, PassthroughSink, Sink, SinkOutcome},
};

/// Outcomes of one dispatched request.
#[derive(Debug)]
pub struct DispatchReport {
    pub primary: SinkOutcome,
    /// `None` when no secondary sink is configured.
    pub secondary: Option<SinkOutcome>,
}

/// Fans each request out to the primary and (optional) secondary sink.
#[derive(Clone)]
pub struct Dispatcher {
    primary: Arc<dyn Sink>,
    secondary: Option<Arc<dyn Sink>>,
}

impl Dispatcher {
    pub fn new(primary: Arc<dyn Sink>, secondary: Option<Arc<dyn Sink>>) -> Self {
        Self { primary, secondary }
    }

    /// Build the standard passthrough + collector pair over a shared client.
    pub fn from_client(client: reqwest::Client, collector: Option<CollectorTarget>) -> Self {
        let primary: Arc<dyn Sink> = Arc::new(PassthroughSink::new(client.clone()));
        let secondary = collector
            .map(|target| Arc::new(CollectorSink::new(client, target)) as Arc<dyn Sink>);
        Self::new(primary, secondary)
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Deliver to both sinks concurrently and wait for both outcomes.
    pub async fn dispatch(&self, delivery: &Delivery) -> DispatchReport {
        let secondary = async {
            match &self.secondary {
                Some(sink) => Some(deliver(sink.as_ref(), delivery).await),
                None => None,
            }
        };

        let (primary, secondary) = tokio::join!(deliver(self.primary.as_ref(), delivery), secondary);

        log_primary(&primary);
        if let Some(outcome) = &secondary {
            log_secondary(outcome);
        }

        DispatchReport { primary, secondary }
    }
}

async fn deliver(sink: &dyn Sink, delivery: &Delivery) -> SinkOutcome {
    let start = Instant::now();
    let result = sink.send(delivery).await;
    tracing::trace!(
        sink = sink.name(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Sink delivery finished"
    );
    SinkOutcome {
        sink: sink.name(),
        result,
    }
}

fn log_primary(outcome: &SinkOutcome) {
    match &outcome.result {
        Ok(response) => tracing::info!(
            sink = outcome.sink,
            status = response.status.as_u16(),
            "Forwarded to intake"
        ),
        Err(e) => tracing::error!(
            sink = outcome.sink,
            status = outcome.status(),
            error = %e,
            "Intake forwarding failed"
        ),
    }
}

fn log_secondary(outcome: &SinkOutcome) {
    match &outcome.result {
        Ok(response) => tracing::info!(
            sink = outcome.sink,
            status = response.status.as_u16(),
            "Forwarded to collector"
        ),
        Err(e) => tracing::warn!(
            sink = outcome.sink,
            status = outcome.status(),
            error = %e,
            "Collector forwarding failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::{
        convert::ConversionContext,
        sinks::{ForwardedHeaders, SinkError, SinkResponse},
    };

    struct FakeSink {
        name: &'static str,
        status: Option<StatusCode>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeSink {
        fn new(name: &'static str, status: Option<StatusCode>) -> Arc<Self> {
            Arc::new(Self {
                name,
                status,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                status: Some(StatusCode::OK),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Sink for FakeSink {
        async fn send(&self, _delivery: &Delivery) -> Result<SinkResponse, SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.status {
                Some(status) => Ok(SinkResponse {
                    status,
                    content_type: None,
                    body: Bytes::from_static(b"ok"),
                }),
                None => Err(SinkError::Status {
                    status: StatusCode::BAD_GATEWAY,
                    body: "down".into(),
                }),
            }
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn delivery() -> Delivery {
        Delivery {
            target: "https://intake.example.com/api/v2/logs".parse().unwrap(),
            headers: ForwardedHeaders::default(),
            body: Bytes::from_static(br#"{"logs":[]}"#),
            context: ConversionContext::new("trace"),
        }
    }

    #[tokio::test]
    async fn test_secondary_failure_does_not_affect_primary() {
        let primary = FakeSink::new("primary", Some(StatusCode::ACCEPTED));
        let secondary = FakeSink::new("secondary", None);
        let dispatcher = Dispatcher::new(primary, Some(secondary.clone() as Arc<dyn Sink>));

        let report = dispatcher.dispatch(&delivery()).await;

        assert!(report.primary.success());
        assert_eq!(report.primary.status(), 202);
        let secondary_outcome = report.secondary.unwrap();
        assert!(!secondary_outcome.success());
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_primary_failure_still_runs_secondary() {
        let primary = FakeSink::new("primary", None);
        let secondary = FakeSink::new("secondary", Some(StatusCode::OK));
        let dispatcher = Dispatcher::new(primary, Some(secondary.clone() as Arc<dyn Sink>));

        let report = dispatcher.dispatch(&delivery()).await;

        assert!(!report.primary.success());
        assert!(report.secondary.unwrap().success());
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_secondary_yields_no_outcome() {
        let dispatcher = Dispatcher::new(FakeSink::new("primary", Some(StatusCode::OK)), None);
        assert!(!dispatcher.has_secondary());

        let report = dispatcher.dispatch(&delivery()).await;
        assert!(report.primary.success());
        assert!(report.secondary.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sinks_run_concurrently() {
        let delay = Duration::from_secs(5);
        let dispatcher = Dispatcher::new(
            FakeSink::slow("primary", delay),
            Some(FakeSink::slow("secondary", delay) as Arc<dyn Sink>),
        );

        let start = tokio::time::Instant::now();
        let report = dispatcher.dispatch(&delivery()).await;

        assert!(report.primary.success());
        assert!(report.secondary.unwrap().success());
        assert!(start.elapsed() < delay * 2);
    }
}
