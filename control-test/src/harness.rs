use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use tower::ServiceExt;
use waystation_control::{build_rpc_router, build_sidecar_router, AppState};
use waystation_core::Config;

/// An in-process instance of both control-plane transports, reachable via
/// `tower::ServiceExt::oneshot` rather than a bound socket.
pub struct TestApp {
    pub state: AppState,
    sidecar_router: Router,
    rpc_router: Router,
}

impl TestApp {
    pub async fn new(mut config: Config) -> Result<Self> {
        config.control_plane.cors_enabled = false;
        config.control_plane.auth_enabled = false;
        config.control_plane.rate_limit_enabled = false;

        let state = AppState::new(config);
        let sidecar_router = build_sidecar_router(state.clone());
        let rpc_router = build_rpc_router(state.clone());

        Ok(Self { state, sidecar_router, rpc_router })
    }

    pub async fn check(
        &self,
        headers: &[(&str, &str)],
        body: Value,
    ) -> Result<(u16, Value)> {
        let mut request = Request::builder().method("POST").uri("/check");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = request.body(Body::from(serde_json::to_vec(&body)?))?;
        self.execute_sidecar(request).await
    }

    pub async fn post_rpc(&self, path: &str, payload: Value) -> Result<Value> {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&payload)?))?;
        let (_, value) = self.execute_rpc(request).await?;
        Ok(value)
    }

    pub async fn get_rpc(&self, path: &str) -> Result<Value> {
        let request = Request::builder().method("GET").uri(path).body(Body::empty())?;
        let (_, value) = self.execute_rpc(request).await?;
        Ok(value)
    }

    pub async fn delete_rpc(&self, path: &str) -> Result<Value> {
        let request = Request::builder().method("DELETE").uri(path).body(Body::empty())?;
        let (_, value) = self.execute_rpc(request).await?;
        Ok(value)
    }

    async fn execute_sidecar(&self, request: Request<Body>) -> Result<(u16, Value)> {
        let response = self
            .sidecar_router
            .clone()
            .oneshot(request)
            .await
            .context("sidecar router execution failed")?;
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await?.to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, value))
    }

    async fn execute_rpc(&self, request: Request<Body>) -> Result<(u16, Value)> {
        let response = self
            .rpc_router
            .clone()
            .oneshot(request)
            .await
            .context("rpc router execution failed")?;
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await?.to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, value))
    }
}

pub fn header_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
