//! Source event fields -> OTLP log record attributes.

use serde_json::{Map, Value};

use super::{
    ConversionContext,
    otlp::{AnyValue, KeyValue},
};

/// Prefix applied to every non-core source field.
pub const CONTEXT_PREFIX: &str = "dd.";

/// Fields consumed by the record itself rather than copied as context.
pub const CORE_FIELDS: [&str; 6] = ["message", "timestamp", "level", "service", "env", "version"];

/// Value of `proxy.source` on every record.
pub const PROXY_SOURCE: &str = "telemetry-fanout";

/// Well-known source fields and the semantic-convention keys they map to.
const RENAMED_FIELDS: [(&str, &str); 3] = [
    ("service", "service.name"),
    ("env", "deployment.environment"),
    ("version", "service.version"),
];

/// Build the ordered attribute list for one source event.
///
/// Renamed core fields come first, then every remaining context field
/// (namespaced with [`CONTEXT_PREFIX`], source order kept), then the
/// `proxy.*` metadata.
pub fn translate_attributes(event: &Map<String, Value>, ctx: &ConversionContext) -> Vec<KeyValue> {
    let mut attributes = Vec::with_capacity(event.len() + 3);

    for (field, key) in RENAMED_FIELDS {
        if let Some(value) = event.get(field) {
            attributes.push(KeyValue::string(key, value_to_text(value)));
        }
    }

    attributes.extend(
        event
            .iter()
            .filter(|(field, _)| !CORE_FIELDS.contains(&field.as_str()))
            .map(|(field, value)| {
                KeyValue::new(format!("{CONTEXT_PREFIX}{field}"), any_value(value))
            }),
    );

    attributes.push(KeyValue::string("proxy.source", PROXY_SOURCE));
    attributes.push(KeyValue::string("proxy.trace_id", ctx.trace_id.clone()));
    attributes.push(KeyValue::string("proxy.captured_at", ctx.captured_at_rfc3339()));

    attributes
}

/// Convert a JSON value to an OTLP value, keeping scalar types.
fn any_value(value: &Value) -> AnyValue {
    match value {
        Value::String(s) => AnyValue::StringValue(s.clone()),
        Value::Bool(b) => AnyValue::BoolValue(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AnyValue::IntValue(i),
            None => n
                .as_f64()
                .map(AnyValue::DoubleValue)
                .unwrap_or_else(|| AnyValue::StringValue(n.to_string())),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => {
            AnyValue::StringValue(value.to_string())
        }
    }
}

/// Render a value as text: strings unquoted, anything else as JSON.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
