//! Datadog browser-log batches -> OTLP/JSON logs.
//!
//! Conversion never fails: bodies that are not JSON become a single
//! synthesized event carrying the raw text, and unusable timestamps fall
//! back to the capture time. The primary sink always receives the original
//! bytes, so the converter only has to be lossless enough for the secondary
//! collector.

pub mod attributes;
pub mod otlp;
pub mod severity;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

pub use attributes::translate_attributes;
pub use otlp::{AnyValue, ExportLogsRequest, KeyValue, LogRecord};
pub use severity::{Severity, map_severity};

use attributes::value_to_text;
use otlp::{InstrumentationScope, Resource, ResourceLogs, ScopeLogs};

/// Field holding the event array in a batched body.
pub const EVENTS_FIELD: &str = "logs";

/// Resource attributes attached to every converted batch.
pub const RESOURCE_ATTRIBUTES: [(&str, &str); 3] = [
    ("service.name", "browser-telemetry"),
    ("telemetry.sdk.name", "datadog-browser-logs"),
    ("telemetry.sdk.language", "webjs"),
];

/// Instrumentation scope name reported on every batch.
pub const SCOPE_NAME: &str = "telemetry-fanout";

const NANOS_PER_MILLI: i64 = 1_000_000;

/// A single source event: the decoded JSON object sent by the SDK.
pub type SourceEvent = Map<String, Value>;

/// Per-request values stamped onto every converted record.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    pub trace_id: String,
    pub captured_at: DateTime<Utc>,
}

impl ConversionContext {
    /// Context captured now.
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self::with_captured_at(trace_id, Utc::now())
    }

    pub fn with_captured_at(trace_id: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            trace_id: trace_id.into(),
            captured_at,
        }
    }

    pub fn captured_at_rfc3339(&self) -> String {
        self.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Capture time in nanoseconds since the Unix epoch (0 if out of range).
    pub fn captured_at_nanos(&self) -> u64 {
        self.captured_at
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or_default()
    }
}

/// Decode a raw request body into its source events.
///
/// - an object with a `logs` array yields that array's elements
/// - any other JSON value yields exactly one event
/// - undecodable bytes yield one `info` event whose message is the raw text
pub fn parse_events(body: &[u8]) -> Vec<SourceEvent> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(mut batch)) => match batch.remove(EVENTS_FIELD) {
            Some(Value::Array(events)) => events.into_iter().map(into_event).collect(),
            Some(other) => {
                batch.insert(EVENTS_FIELD.to_string(), other);
                vec![batch]
            }
            None => vec![batch],
        },
        Ok(other) => vec![into_event(other)],
        Err(e) => {
            tracing::debug!(error = %e, bytes = body.len(), "Body is not JSON, wrapping as text");
            vec![synthesized_event(String::from_utf8_lossy(body).into_owned())]
        }
    }
}

fn into_event(value: Value) -> SourceEvent {
    match value {
        Value::Object(map) => map,
        other => synthesized_event(value_to_text(&other)),
    }
}

fn synthesized_event(message: String) -> SourceEvent {
    let mut event = Map::new();
    event.insert("message".to_string(), Value::String(message));
    event.insert("level".to_string(), Value::String("info".to_string()));
    event
}

/// Convert one source event into an OTLP log record.
pub fn convert_event(event: &SourceEvent, ctx: &ConversionContext) -> LogRecord {
    let severity = map_severity(event.get("level").and_then(Value::as_str));
    let observed = ctx.captured_at_nanos();

    LogRecord {
        time_unix_nano: event
            .get("timestamp")
            .and_then(timestamp_nanos)
            .unwrap_or(observed),
        observed_time_unix_nano: observed,
        severity_number: severity.number,
        severity_text: severity.text,
        body: AnyValue::StringValue(record_body(event)),
        attributes: translate_attributes(event, ctx),
    }
}

/// Convert a raw request body into an OTLP logs export request.
///
/// The record count and order always match [`parse_events`].
pub fn convert_batch(body: &[u8], ctx: &ConversionContext) -> ExportLogsRequest {
    let log_records = parse_events(body)
        .iter()
        .map(|event| convert_event(event, ctx))
        .collect();

    ExportLogsRequest {
        resource_logs: vec![ResourceLogs {
            resource: Resource {
                attributes: RESOURCE_ATTRIBUTES
                    .iter()
                    .map(|(k, v)| KeyValue::string(*k, *v))
                    .collect(),
            },
            scope_logs: vec![ScopeLogs {
                scope: InstrumentationScope {
                    name: SCOPE_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                log_records,
            }],
        }],
    }
}

/// Event time in nanoseconds since the Unix epoch.
///
/// Numbers (and numeric strings) are epoch milliseconds; other strings must
/// be RFC 3339. Negative or overflowing values are rejected.
fn timestamp_nanos(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(ms) => millis_to_nanos(ms),
            None => n.as_f64().and_then(float_millis_to_nanos),
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                dt.timestamp_nanos_opt().and_then(|n| u64::try_from(n).ok())
            } else if let Ok(ms) = s.parse::<i64>() {
                millis_to_nanos(ms)
            } else {
                s.parse::<f64>().ok().and_then(float_millis_to_nanos)
            }
        }
        _ => None,
    }
}

fn millis_to_nanos(ms: i64) -> Option<u64> {
    ms.checked_mul(NANOS_PER_MILLI)
        .and_then(|n| u64::try_from(n).ok())
}

fn float_millis_to_nanos(ms: f64) -> Option<u64> {
    let nanos = ms * NANOS_PER_MILLI as f64;
    (nanos.is_finite() && nanos >= 0.0 && nanos < u64::MAX as f64).then_some(nanos as u64)
}

fn record_body(event: &SourceEvent) -> String {
    match event.get("message") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(other) if !other.is_null() && !other.is_string() => other.to_string(),
        _ => serde_json::to_string(event).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn ctx() -> ConversionContext {
        ConversionContext::with_captured_at(
            "feedfacefeedfacefeedfacefeedface",
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    const CAPTURED_NANOS: u64 = 1_714_564_800_000_000_000;

    #[test]
    fn test_batch_with_single_error_event() {
        let body = br#"{"logs":[{"message":"m1","level":"error","service":"svc","retryCount":3}]}"#;
        let request = convert_batch(body, &ctx());
        let records: Vec<_> = request.log_records().collect();

        assert_eq!(records.len(), 1);
        let record = records[0];
        assert_eq!(record.severity_number, 17);
        assert_eq!(record.severity_text, "ERROR");
        assert_eq!(record.body.as_str(), Some("m1"));
        assert_eq!(
            record.attribute("service.name").and_then(AnyValue::as_str),
            Some("svc")
        );
        assert_eq!(record.attribute("dd.retryCount"), Some(&AnyValue::IntValue(3)));
        assert!(record.attribute("proxy.source").is_some());
        assert!(record.attribute("proxy.trace_id").is_some());
        assert!(record.attribute("proxy.captured_at").is_some());
    }

    #[test]
    fn test_unparseable_body_becomes_one_info_record() {
        let request = convert_batch(b"not json", &ctx());
        let records: Vec<_> = request.log_records().collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body.as_str(), Some("not json"));
        assert_eq!(records[0].severity_number, 9);
        assert_eq!(records[0].severity_text, "INFO");
        assert_eq!(records[0].time_unix_nano, CAPTURED_NANOS);
    }

    #[test]
    fn test_count_and_order_preserved() {
        let events: Vec<Value> = (0..25)
            .map(|i| json!({"message": format!("event-{i}"), "level": "debug"}))
            .collect();
        let body = serde_json::to_vec(&json!({ "logs": events })).unwrap();

        let request = convert_batch(&body, &ctx());
        let bodies: Vec<_> = request
            .log_records()
            .map(|r| r.body.as_str().unwrap().to_string())
            .collect();

        let expected: Vec<_> = (0..25).map(|i| format!("event-{i}")).collect();
        assert_eq!(bodies, expected);
    }

    #[test]
    fn test_single_object_without_logs_is_one_event() {
        let request = convert_batch(br#"{"message":"solo","level":"warn"}"#, &ctx());
        let records: Vec<_> = request.log_records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity_text, "WARN");
        assert_eq!(records[0].body.as_str(), Some("solo"));
    }

    #[test]
    fn test_non_array_logs_field_kept_as_context() {
        let events = parse_events(br#"{"message":"x","logs":"not-a-list"}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["logs"], "not-a-list");
    }

    #[test]
    fn test_non_object_json_values() {
        let events = parse_events(br#""just a string""#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["message"], "just a string");

        let events = parse_events(br#"{"logs":[{"message":"a"},42]}"#);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["message"], "42");
    }

    #[test]
    fn test_empty_logs_array_yields_no_records() {
        let request = convert_batch(br#"{"logs":[]}"#, &ctx());
        assert_eq!(request.log_records().count(), 0);
        assert_eq!(request.resource_logs.len(), 1);
    }

    #[test]
    fn test_envelope_resource_and_scope() {
        let request = convert_batch(br#"{"logs":[]}"#, &ctx());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["resourceLogs"][0]["resource"]["attributes"],
            json!([
                {"key": "service.name", "value": {"stringValue": "browser-telemetry"}},
                {"key": "telemetry.sdk.name", "value": {"stringValue": "datadog-browser-logs"}},
                {"key": "telemetry.sdk.language", "value": {"stringValue": "webjs"}},
            ])
        );
        assert_eq!(
            value["resourceLogs"][0]["scopeLogs"][0]["scope"],
            json!({"name": "telemetry-fanout", "version": env!("CARGO_PKG_VERSION")})
        );
    }

    #[test]
    fn test_timestamp_variants() {
        let ms = 1_700_000_000_123i64;
        let expected = 1_700_000_000_123_000_000u64;

        assert_eq!(timestamp_nanos(&json!(ms)), Some(expected));
        assert_eq!(timestamp_nanos(&json!(ms.to_string())), Some(expected));
        let fractional = timestamp_nanos(&json!(1_700_000_000_123.5)).unwrap();
        assert!(fractional.abs_diff(expected + 500_000) < 1_000, "{fractional}");
        assert_eq!(
            timestamp_nanos(&json!("2023-11-14T22:13:20.123Z")),
            Some(expected)
        );
        assert_eq!(timestamp_nanos(&json!(-5)), None);
        assert_eq!(timestamp_nanos(&json!("yesterday")), None);
        assert_eq!(timestamp_nanos(&json!(true)), None);
        assert_eq!(timestamp_nanos(&json!(i64::MAX)), None);
    }

    #[test]
    fn test_bad_timestamp_falls_back_to_capture_time() {
        let request = convert_batch(
            br#"{"logs":[{"message":"m","timestamp":"not-a-date"}]}"#,
            &ctx(),
        );
        let record = request.log_records().next().unwrap();
        assert_eq!(record.time_unix_nano, CAPTURED_NANOS);
        assert_eq!(record.observed_time_unix_nano, CAPTURED_NANOS);
    }

    #[test]
    fn test_body_fallbacks() {
        let ctx = ctx();

        let record = convert_event(&parse_events(br#"{"message":""}"#).remove(0), &ctx);
        assert_eq!(record.body.as_str(), Some(r#"{"message":""}"#));

        let record = convert_event(&parse_events(br#"{"status":"ok"}"#).remove(0), &ctx);
        assert_eq!(record.body.as_str(), Some(r#"{"status":"ok"}"#));

        let record = convert_event(&parse_events(br#"{"message":{"k":1}}"#).remove(0), &ctx);
        assert_eq!(record.body.as_str(), Some(r#"{"k":1}"#));
    }

    #[test]
    fn test_scalar_types_survive_serialization() {
        let request = convert_batch(
            br#"{"logs":[{"message":"m","count":7,"ratio":1.5,"ok":true,"name":"n"}]}"#,
            &ctx(),
        );
        let value = serde_json::to_value(&request).unwrap();
        let attrs = &value["resourceLogs"][0]["scopeLogs"][0]["logRecords"][0]["attributes"];

        assert_eq!(attrs[0], json!({"key": "dd.count", "value": {"intValue": "7"}}));
        assert_eq!(attrs[1], json!({"key": "dd.ratio", "value": {"doubleValue": 1.5}}));
        assert_eq!(attrs[2], json!({"key": "dd.ok", "value": {"boolValue": true}}));
        assert_eq!(attrs[3], json!({"key": "dd.name", "value": {"stringValue": "n"}}));
    }
}
