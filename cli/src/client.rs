use anyhow::{bail, Result};
use serde_json::Value;

/// Thin HTTP client over the control plane's RPC surface. Every method maps
/// 1:1 to one control-plane operation — this crate adds no business logic of
/// its own, it only shapes requests and unwraps the `{success, data, error}`
/// envelope.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControlPlaneClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self.http.get(format!("{}{}", self.base_url, path)).send().await?;
        Self::unwrap_envelope(response.json().await?)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?;
        Self::unwrap_envelope(response.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        let response = self.http.delete(format!("{}{}", self.base_url, path)).send().await?;
        Self::unwrap_envelope(response.json().await?)
    }

    fn unwrap_envelope(envelope: Value) -> Result<Value> {
        if envelope["success"].as_bool() == Some(false) {
            let message = envelope["error"].as_str().unwrap_or("request failed").to_string();
            bail!(message);
        }
        Ok(envelope["data"].clone())
    }

    pub async fn register_breakpoint(&self, service: &str, endpoint: &str, conditions: Value) -> Result<Value> {
        self.post(
            "/rpc/breakpoints",
            serde_json::json!({ "service": service, "endpoint": endpoint, "conditions": conditions }),
        )
        .await
    }

    pub async fn list_breakpoints(&self) -> Result<Value> {
        self.get("/rpc/breakpoints").await
    }

    pub async fn delete_breakpoint(&self, id: &str) -> Result<Value> {
        self.delete(&format!("/rpc/breakpoints/{id}")).await
    }

    pub async fn freeze_trace(&self, trace_id: &str, services: Vec<String>) -> Result<Value> {
        self.post(
            "/rpc/freeze",
            serde_json::json!({ "trace_id": trace_id, "services": services }),
        )
        .await
    }

    pub async fn release_trace(&self, trace_id: &str, override_body: Option<String>) -> Result<Value> {
        self.post(
            "/rpc/release",
            serde_json::json!({ "trace_id": trace_id, "override_body": override_body }),
        )
        .await
    }

    pub async fn freeze_status(&self, trace_id: &str) -> Result<Value> {
        self.get(&format!("/rpc/freezes/{trace_id}")).await
    }

    pub async fn list_active_freezes(&self) -> Result<Value> {
        self.get("/rpc/freezes").await
    }

    pub async fn get_snapshot(&self, trace_id: &str) -> Result<Value> {
        self.get(&format!("/rpc/snapshot/{trace_id}")).await
    }

    pub async fn get_app_snapshot(&self, trace_id: &str) -> Result<Value> {
        self.get(&format!("/rpc/app-snapshot/{trace_id}")).await
    }

    pub async fn emergency_release(&self) -> Result<Value> {
        self.post("/rpc/emergency-release", serde_json::json!({})).await
    }

    pub async fn system_health(&self) -> Result<Value> {
        self.get("/rpc/health").await
    }

    pub async fn topology(&self) -> Result<Value> {
        self.get("/rpc/topology").await
    }
}
