use crate::model::Breakpoint;
use serde_json::Value;
use std::collections::HashMap;

/// Builds the flat `string -> string` keyspace a breakpoint's conditions are
/// evaluated against.
///
/// For each header `name: value`: inserts `header.<name-lowercased> -> value`
/// and, if not already present, the short key `<name-lowercased> -> value`.
/// If `body` is present, it is flattened (dotted paths, numeric array
/// indices) and each leaf is inserted as both `body.<path> -> value` and the
/// short `<path> -> value`, which is allowed to overwrite a header's short
/// key — body is processed second, so body wins on a short-key collision.
pub fn build_keyspace(headers: &HashMap<String, String>, body: Option<&Value>) -> HashMap<String, String> {
    let mut keyspace = HashMap::new();

    for (name, value) in headers {
        let lname = name.to_lowercase();
        keyspace.insert(format!("header.{}", lname), value.clone());
        keyspace.entry(lname).or_insert_with(|| value.clone());
    }

    if let Some(body) = body {
        flatten_json(body, "", &mut keyspace);
    }

    keyspace
}

fn flatten_json(value: &Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let next_prefix = join_path(prefix, key);
                flatten_json(val, &next_prefix, out);
            }
        }
        Value::Array(items) => {
            for (index, val) in items.iter().enumerate() {
                let next_prefix = join_path(prefix, &index.to_string());
                flatten_json(val, &next_prefix, out);
            }
        }
        scalar => {
            if prefix.is_empty() {
                return;
            }
            let stringified = stringify_scalar(scalar);
            out.insert(format!("body.{}", prefix), stringified.clone());
            out.insert(prefix.to_string(), stringified);
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

fn stringify_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => value.to_string(),
    }
}

/// Evaluates registered breakpoints against a query. Returns the first
/// enabled breakpoint whose service matches exactly, whose endpoint is a
/// substring of the query endpoint, and whose every condition holds against
/// the built keyspace. No ordering guarantee is made beyond "first in the
/// given slice" — callers should ensure at most one freeze is initiated per
/// query regardless of which breakpoint wins ties.
pub fn evaluate<'a>(
    breakpoints: &'a [Breakpoint],
    service: &str,
    endpoint: &str,
    headers: &HashMap<String, String>,
    body: Option<&Value>,
) -> Option<&'a Breakpoint> {
    let keyspace = build_keyspace(headers, body);

    breakpoints.iter().find(|bp| {
        bp.enabled
            && bp.service == service
            && endpoint.contains(bp.endpoint.as_str())
            && bp
                .conditions
                .iter()
                .all(|(k, expected)| keyspace.get(k) == Some(expected))
    })
}
