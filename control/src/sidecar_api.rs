use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use waystation_core::{match_engine, ApplicationSnapshot, NetworkSnapshot, TraceEvent};

use crate::state::AppState;

const ORIG_HEADER_PREFIX: &str = "x-orig-";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/check", post(check_handler))
        .route("/snapshot", post(snapshot_handler))
        .route("/app-snapshot", post(app_snapshot_handler))
}

#[derive(Debug, Serialize)]
struct CheckResponse {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    override_body: Option<String>,
}

fn allow(override_body: Option<String>) -> CheckResponse {
    CheckResponse {
        action: "allow",
        override_body,
    }
}

fn freeze() -> CheckResponse {
    CheckResponse {
        action: "freeze",
        override_body: None,
    }
}

/// `POST /check` — the sidecar's long-poll target. Broadcasts a live trace
/// event unconditionally, then branches frozen → pending override → match
/// engine → allow.
async fn check_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let trace_id = match header_str(&headers, "x-trace-id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            return (StatusCode::BAD_REQUEST, Json(allow(None))).into_response();
        }
    };
    let service = header_str(&headers, "x-service-name").unwrap_or_default();
    let endpoint = header_str(&headers, "x-endpoint").unwrap_or_default();

    state
        .events
        .publish_trace(TraceEvent {
            trace_id: trace_id.clone(),
            service: service.clone(),
            endpoint: endpoint.clone(),
            unix_seconds: Utc::now().timestamp(),
            attributes: None,
        })
        .await;

    if state.freezes.is_frozen(&trace_id).await {
        return (StatusCode::OK, Json(freeze())).into_response();
    }

    if let Some(override_body) = state.freezes.consume_override(&trace_id).await {
        return (StatusCode::OK, Json(allow(Some(override_body)))).into_response();
    }

    if state.config.match_engine.enabled {
        let original_headers = original_request_headers(&headers);
        let body_value: Option<Value> = serde_json::from_slice(&body).ok();

        let breakpoints = state.breakpoints.list().await;
        let matched = match_engine::evaluate(
            &breakpoints,
            &service,
            &endpoint,
            &original_headers,
            body_value.as_ref(),
        )
        .cloned();

        if let Some(breakpoint) = matched {
            match state
                .freezes
                .initiate_freeze(trace_id.clone(), vec![service.clone()], None)
                .await
            {
                Ok(_) => {
                    debug!(trace_id = %trace_id, breakpoint = %breakpoint.id, "breakpoint matched, trace frozen");
                }
                Err(waystation_core::WaystationError::Conflict(_)) => {
                    // Another concurrent /check for the same trace already froze it.
                }
                Err(err) => {
                    warn!(trace_id = %trace_id, error = %err.message(), "failed to initiate freeze on match, failing open");
                    return (StatusCode::OK, Json(allow(None))).into_response();
                }
            }
            return (StatusCode::OK, Json(freeze())).into_response();
        }
    }

    (StatusCode::OK, Json(allow(None))).into_response()
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Rebuilds the original inbound request's headers from the `x-orig-<name>`
/// mirrors the sidecar attaches to every `/check` call.
fn original_request_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (name, value) in headers.iter() {
        let name = name.as_str();
        if let Some(original) = name.strip_prefix(ORIG_HEADER_PREFIX) {
            if let Ok(value) = value.to_str() {
                out.insert(original.to_string(), value.to_string());
            }
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    trace_id: String,
    service_name: String,
    method: String,
    #[serde(default)]
    body: String,
}

/// `POST /snapshot` — network snapshot ingress, first write wins per trace.
async fn snapshot_handler(
    State(state): State<AppState>,
    Json(payload): Json<SnapshotPayload>,
) -> impl IntoResponse {
    state
        .snapshots
        .record_network(NetworkSnapshot {
            trace_id: payload.trace_id,
            service_name: payload.service_name,
            method: payload.method,
            body: payload.body,
        })
        .await;
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct AppSnapshotPayload {
    trace_id: String,
    service_name: String,
    checkpoint: String,
    stack_trace: String,
    #[serde(default)]
    local_variables: HashMap<String, Value>,
    timestamp: chrono::DateTime<Utc>,
}

/// `POST /app-snapshot` — application snapshot ingress, appended in arrival
/// order per trace.
async fn app_snapshot_handler(
    State(state): State<AppState>,
    Json(payload): Json<AppSnapshotPayload>,
) -> impl IntoResponse {
    state
        .snapshots
        .record_app(ApplicationSnapshot {
            trace_id: payload.trace_id,
            service_name: payload.service_name,
            checkpoint: payload.checkpoint,
            stack_trace: payload.stack_trace,
            local_variables: payload.local_variables,
            timestamp: payload.timestamp,
        })
        .await;
    StatusCode::OK
}

async fn root_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain")],
        "waystation sidecar-facing surface: POST /check, POST /snapshot, POST /app-snapshot\n",
    )
}
