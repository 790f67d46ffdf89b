use http::HeaderMap;

const TRACEPARENT: &str = "traceparent";
const B3_TRACE_ID: &str = "x-b3-traceid";
const X_TRACE_ID: &str = "x-trace-id";

/// Extract a trace id from inbound request headers.
///
/// Recognized sources, in priority order:
/// 1. `traceparent` (W3C) — the 32-hex trace-id field, positions 3..34.
/// 2. `x-b3-traceid`.
/// 3. `x-trace-id`.
///
/// Returns `None` if no source resolves to a non-empty id; callers must treat
/// that as untagged traffic and bypass interception entirely rather than
/// delay the request.
pub fn extract_trace_id(headers: &HeaderMap) -> Option<String> {
    if let Some(id) = headers
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .and_then(trace_id_from_traceparent)
    {
        return Some(id);
    }

    if let Some(id) = non_empty_header(headers, B3_TRACE_ID) {
        return Some(id);
    }

    non_empty_header(headers, X_TRACE_ID)
}

fn non_empty_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse the 32-hex trace-id field out of a W3C `traceparent` value
/// (`version-traceid-spanid-flags`). Returns `None` if the field is not
/// exactly 32 hex characters or is the reserved all-zero id.
fn trace_id_from_traceparent(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() < 4 {
        return None;
    }
    let trace_id = parts[1];
    if trace_id.len() != 32 || !trace_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    if trace_id.chars().all(|c| c == '0') {
        return None;
    }
    Some(trace_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(
                http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        h
    }

    #[test]
    fn prefers_traceparent_over_other_sources() {
        let h = headers(&[
            (
                "traceparent",
                "00-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa-bbbbbbbbbbbbbbbb-01",
            ),
            ("x-b3-traceid", "ffffffffffffffffffffffffffffffff"),
        ]);
        assert_eq!(
            extract_trace_id(&h).as_deref(),
            Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
    }

    #[test]
    fn falls_back_to_b3_then_x_trace_id() {
        let h = headers(&[("x-b3-traceid", "b3traceid000000000000000000000")]);
        assert_eq!(
            extract_trace_id(&h).as_deref(),
            Some("b3traceid000000000000000000000")
        );

        let h = headers(&[("x-trace-id", "plain-trace-id")]);
        assert_eq!(extract_trace_id(&h).as_deref(), Some("plain-trace-id"));
    }

    #[test]
    fn short_traceparent_trace_id_is_treated_as_untagged() {
        let h = headers(&[("traceparent", "00-short-bbbbbbbbbbbbbbbb-01")]);
        assert_eq!(extract_trace_id(&h), None);
    }

    #[test]
    fn all_zero_traceparent_trace_id_is_rejected() {
        let h = headers(&[(
            "traceparent",
            "00-00000000000000000000000000000000-bbbbbbbbbbbbbbbb-01",
        )]);
        assert_eq!(extract_trace_id(&h), None);
    }

    #[test]
    fn no_recognized_header_is_untagged() {
        let h = headers(&[("x-request-id", "abc123")]);
        assert_eq!(extract_trace_id(&h), None);
    }
}
