//! OTLP/JSON logs payload types.
//!
//! Only the subset of `ExportLogsServiceRequest` the proxy emits is modelled.
//! Field names follow the OTLP/JSON encoding (lowerCamelCase, 64-bit
//! integers as decimal strings).

use serde::{Serialize, Serializer};

/// Top-level payload POSTed to the collector's `/v1/logs` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportLogsRequest {
    pub resource_logs: Vec<ResourceLogs>,
}

impl ExportLogsRequest {
    /// All log records, across every resource and scope, in order.
    pub fn log_records(&self) -> impl Iterator<Item = &LogRecord> {
        self.resource_logs
            .iter()
            .flat_map(|r| r.scope_logs.iter())
            .flat_map(|s| s.log_records.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLogs {
    pub resource: Resource,
    pub scope_logs: Vec<ScopeLogs>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeLogs {
    pub scope: InstrumentationScope,
    pub log_records: Vec<LogRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
}

/// One converted source event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(serialize_with = "u64_as_string")]
    pub time_unix_nano: u64,
    #[serde(serialize_with = "u64_as_string")]
    pub observed_time_unix_nano: u64,
    pub severity_number: i32,
    pub severity_text: &'static str,
    pub body: AnyValue,
    pub attributes: Vec<KeyValue>,
}

impl LogRecord {
    /// Look up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&AnyValue> {
        self.attributes
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| &kv.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: AnyValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, AnyValue::StringValue(value.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnyValue {
    StringValue(String),
    #[serde(serialize_with = "i64_as_string")]
    IntValue(i64),
    DoubleValue(f64),
    BoolValue(bool),
}

impl AnyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::StringValue(s) => Some(s),
            _ => None,
        }
    }
}

fn u64_as_string<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn i64_as_string<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_log_record_wire_shape() {
        let record = LogRecord {
            time_unix_nano: 1_700_000_000_123_000_000,
            observed_time_unix_nano: 1_700_000_001_000_000_000,
            severity_number: 17,
            severity_text: "ERROR",
            body: AnyValue::StringValue("boom".into()),
            attributes: vec![
                KeyValue::string("service.name", "web"),
                KeyValue::new("dd.retryCount", AnyValue::IntValue(3)),
                KeyValue::new("dd.ratio", AnyValue::DoubleValue(0.5)),
                KeyValue::new("dd.cached", AnyValue::BoolValue(true)),
            ],
        };

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "timeUnixNano": "1700000000123000000",
                "observedTimeUnixNano": "1700000001000000000",
                "severityNumber": 17,
                "severityText": "ERROR",
                "body": {"stringValue": "boom"},
                "attributes": [
                    {"key": "service.name", "value": {"stringValue": "web"}},
                    {"key": "dd.retryCount", "value": {"intValue": "3"}},
                    {"key": "dd.ratio", "value": {"doubleValue": 0.5}},
                    {"key": "dd.cached", "value": {"boolValue": true}},
                ]
            })
        );
    }

    #[test]
    fn test_envelope_wire_shape() {
        let request = ExportLogsRequest {
            resource_logs: vec![ResourceLogs {
                resource: Resource {
                    attributes: vec![KeyValue::string("service.name", "browser-telemetry")],
                },
                scope_logs: vec![ScopeLogs {
                    scope: InstrumentationScope {
                        name: "telemetry-fanout".into(),
                        version: "0.1.0".into(),
                    },
                    log_records: vec![],
                }],
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["resourceLogs"][0]["resource"]["attributes"][0]["key"],
            "service.name"
        );
        assert_eq!(
            value["resourceLogs"][0]["scopeLogs"][0]["scope"]["name"],
            "telemetry-fanout"
        );
        assert!(value["resourceLogs"][0]["scopeLogs"][0]["logRecords"]
            .as_array()
            .unwrap()
            .is_empty());
    }
}
