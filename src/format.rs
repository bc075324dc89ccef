//! Flattening of result frames into printable key/value pairs.

use serde_json::Value;

use crate::protocol::ResultEnvelope;

/// Every `result` entry of every command ack, in order.
///
/// Strings are taken verbatim. Every other value is printed as compact JSON text, so
/// booleans read `true`/`false`, a missing value reads `null` and nested objects or
/// arrays keep their JSON form (`{"a":1}`). Consumers parsing the `key: value` output
/// should expect JSON spelling here, not the capitalized `True`/`None` some older
/// tooling printed.
pub fn result_pairs(envelope: &ResultEnvelope) -> Vec<(String, String)> {
    envelope
        .command_acks()
        .iter()
        .filter_map(|ack| ack.result.as_ref())
        .flat_map(|result| result.iter())
        .map(|(key, value)| (key.clone(), value_text(value)))
        .collect()
}

/// `key: value` lines for terminal output.
pub fn render_lines(pairs: &[(String, String)]) -> impl Iterator<Item = String> + '_ {
    pairs.iter().map(|(key, value)| format!("{key}: {value}"))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
