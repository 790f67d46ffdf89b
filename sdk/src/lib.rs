//! Instrumentation helper for application code that wants to push
//! checkpoint state to a Waystation control plane. This crate implements
//! exactly the wire contract of `POST /app-snapshot` — it does not attempt
//! to auto-capture locals or stack frames; callers supply both explicitly.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaystationSdkError {
    #[error("checkpoint dispatch failed: {0}")]
    Dispatch(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct AppSnapshotPayload<'a> {
    trace_id: &'a str,
    service_name: &'a str,
    checkpoint: &'a str,
    stack_trace: &'a str,
    local_variables: &'a HashMap<String, Value>,
    timestamp: chrono::DateTime<Utc>,
}

/// A client bound to one service, reused across every checkpoint it pushes.
#[derive(Clone)]
pub struct WaystationClient {
    http: reqwest::Client,
    control_plane_url: String,
    service_name: String,
}

impl WaystationClient {
    pub fn new(control_plane_url: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            control_plane_url: control_plane_url.into().trim_end_matches('/').to_string(),
            service_name: service_name.into(),
        }
    }

    /// Pushes one application snapshot: a named checkpoint plus whatever
    /// local state and call-stack text the caller wants visible in the hop
    /// journey. Order across hops is arrival order, not a causal guarantee.
    pub async fn checkpoint(
        &self,
        trace_id: &str,
        checkpoint: &str,
        stack_trace: &str,
        local_variables: HashMap<String, Value>,
    ) -> Result<(), WaystationSdkError> {
        let payload = AppSnapshotPayload {
            trace_id,
            service_name: &self.service_name,
            checkpoint,
            stack_trace,
            local_variables: &local_variables,
            timestamp: Utc::now(),
        };

        self.http
            .post(format!("{}/app-snapshot", self.control_plane_url))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Builds a local-variable map from `(name, value)` pairs, the shape most
/// call sites reach for rather than constructing a `HashMap` by hand.
pub fn locals(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> HashMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locals_builds_a_string_keyed_map() {
        let map = locals([("amount", json!(999)), ("order_id", json!("ORD-1"))]);
        assert_eq!(map.get("amount"), Some(&json!(999)));
        assert_eq!(map.get("order_id"), Some(&json!("ORD-1")));
    }

    #[test]
    fn client_normalizes_trailing_slash_on_base_url() {
        let client = WaystationClient::new("http://localhost:9000/", "orders");
        assert_eq!(client.control_plane_url, "http://localhost:9000");
    }
}
