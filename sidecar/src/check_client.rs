use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// The decision a `/check` long-poll resolves to. `override_body` is only
/// ever populated alongside `allow`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckDecision {
    pub action: String,
    #[serde(default)]
    pub override_body: Option<String>,
}

impl CheckDecision {
    pub fn is_freeze(&self) -> bool {
        self.action == "freeze"
    }
}

#[derive(Debug, Clone, Serialize)]
struct SnapshotPayload<'a> {
    trace_id: &'a str,
    service_name: &'a str,
    method: &'a str,
    body: &'a str,
}

/// Thin client over the control plane's sidecar-facing surface. One per
/// sidecar process; cheap to clone (wraps a pooled `reqwest::Client`).
#[derive(Clone)]
pub struct CheckClient {
    http: Client,
    control_plane_url: String,
}

impl CheckClient {
    pub fn new(control_plane_url: String, dispatch_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(dispatch_timeout).build()?;
        Ok(Self { http, control_plane_url })
    }

    /// Issues one `/check` call. Every non-pseudo inbound header is mirrored
    /// as `x-orig-<lower-name>` so the match engine can evaluate it.
    pub async fn check(
        &self,
        trace_id: &str,
        service_name: &str,
        endpoint: &str,
        original_headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<CheckDecision> {
        let mut request = self
            .http
            .post(format!("{}/check", self.control_plane_url))
            .header("x-trace-id", trace_id)
            .header("x-service-name", service_name)
            .header("x-endpoint", endpoint)
            .header("content-type", "application/json");

        for (name, value) in original_headers {
            request = request.header(format!("x-orig-{}", name.to_lowercase()), value);
        }

        let body = if body.is_empty() { b"{}".to_vec() } else { body.to_vec() };
        let response = request.body(body).send().await?;
        let decision: CheckDecision = response.json().await?;
        Ok(decision)
    }

    /// Sends the network snapshot for a request's freeze. The caller is
    /// responsible for calling this at most once per request.
    pub async fn send_snapshot(
        &self,
        trace_id: &str,
        service_name: &str,
        method_and_path: &str,
        body: &str,
    ) -> Result<()> {
        self.http
            .post(format!("{}/snapshot", self.control_plane_url))
            .json(&SnapshotPayload {
                trace_id,
                service_name,
                method: method_and_path,
                body,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
