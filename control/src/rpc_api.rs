use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use waystation_core::{Breakpoint, TraceFreeze};

use crate::response::{error_response, ApiResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/rpc/breakpoints", post(register_breakpoint).get(list_breakpoints))
        .route("/rpc/breakpoints/:id", delete(delete_breakpoint))
        .route("/rpc/freeze", post(freeze_trace))
        .route("/rpc/release", post(release_trace))
        .route("/rpc/freezes", get(list_active_freezes))
        .route("/rpc/freezes/:trace_id", get(freeze_status))
        .route("/rpc/snapshot/:trace_id", get(get_snapshot))
        .route("/rpc/app-snapshot/:trace_id", get(get_app_snapshot))
        .route("/rpc/emergency-release", post(emergency_release))
        .route("/rpc/health", get(system_health))
        .route("/rpc/topology", get(topology))
        .route("/rpc/events", get(stream_traces))
}

async fn root_handler() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html>
<head>
    <title>Waystation - Distributed Breakpoints</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 800px;
            margin: 50px auto;
            padding: 20px;
            background: linear-gradient(135deg, #2b5876 0%, #4e4376 100%);
            color: white;
        }
        .container {
            background: rgba(255, 255, 255, 0.1);
            backdrop-filter: blur(10px);
            border-radius: 20px;
            padding: 40px;
            box-shadow: 0 8px 32px 0 rgba(31, 38, 135, 0.37);
        }
        h1 { font-size: 3em; margin: 0; }
        .tagline { font-size: 1.2em; opacity: 0.9; margin-top: 10px; }
        .endpoints {
            margin-top: 30px;
            background: rgba(0, 0, 0, 0.2);
            padding: 20px;
            border-radius: 10px;
        }
        .endpoint {
            margin: 10px 0;
            font-family: monospace;
        }
        .method {
            display: inline-block;
            padding: 3px 8px;
            border-radius: 4px;
            margin-right: 10px;
            font-weight: bold;
        }
        .get { background: rgba(72, 182, 255, 0.2); color: #48b6ff; }
        .post { background: rgba(72, 255, 145, 0.2); color: #48ff91; }
        .delete { background: rgba(255, 99, 99, 0.2); color: #ff6363; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Waystation</h1>
        <div class="tagline">Coordinated request-scoped breakpoints across a service mesh</div>
        <div class="endpoints">
            <div class="endpoint"><span class="method get">GET</span> /rpc/breakpoints</div>
            <div class="endpoint"><span class="method post">POST</span> /rpc/breakpoints</div>
            <div class="endpoint"><span class="method delete">DELETE</span> /rpc/breakpoints/:id</div>
            <div class="endpoint"><span class="method post">POST</span> /rpc/freeze</div>
            <div class="endpoint"><span class="method post">POST</span> /rpc/release</div>
            <div class="endpoint"><span class="method get">GET</span> /rpc/freezes</div>
            <div class="endpoint"><span class="method get">GET</span> /rpc/freezes/:trace_id</div>
            <div class="endpoint"><span class="method get">GET</span> /rpc/snapshot/:trace_id</div>
            <div class="endpoint"><span class="method get">GET</span> /rpc/app-snapshot/:trace_id</div>
            <div class="endpoint"><span class="method post">POST</span> /rpc/emergency-release</div>
            <div class="endpoint"><span class="method get">GET</span> /rpc/health</div>
            <div class="endpoint"><span class="method get">GET</span> /rpc/topology</div>
            <div class="endpoint"><span class="method get">GET</span> /rpc/events</div>
        </div>
    </div>
</body>
</html>
    "#;

    (axum::http::StatusCode::OK, [("content-type", "text/html")], html)
}

#[derive(Debug, Deserialize)]
struct RegisterBreakpointRequest {
    service: String,
    endpoint: String,
    #[serde(default)]
    conditions: HashMap<String, String>,
}

async fn register_breakpoint(
    State(state): State<AppState>,
    Json(req): Json<RegisterBreakpointRequest>,
) -> impl IntoResponse {
    let breakpoint = state
        .breakpoints
        .register(req.service, req.endpoint, req.conditions)
        .await;
    ApiResponse::success(breakpoint)
}

async fn list_breakpoints(State(state): State<AppState>) -> impl IntoResponse {
    let breakpoints: Vec<Breakpoint> = state.breakpoints.list().await;
    ApiResponse::success(breakpoints)
}

async fn delete_breakpoint(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    if state.breakpoints.delete(&id).await {
        ApiResponse::success(serde_json::json!({ "id": id, "deleted": true }))
    } else {
        ApiResponse::error(format!("no breakpoint with id {id}"))
    }
}

#[derive(Debug, Deserialize)]
struct FreezeTraceRequest {
    trace_id: String,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

async fn freeze_trace(State(state): State<AppState>, Json(req): Json<FreezeTraceRequest>) -> impl IntoResponse {
    match state
        .freezes
        .initiate_freeze(req.trace_id, req.services, req.timeout_secs)
        .await
    {
        Ok(freeze) => ApiResponse::success(freeze).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseTraceRequest {
    trace_id: String,
    #[serde(default)]
    override_body: Option<String>,
}

async fn release_trace(State(state): State<AppState>, Json(req): Json<ReleaseTraceRequest>) -> impl IntoResponse {
    match state.freezes.release_freeze(&req.trace_id, req.override_body).await {
        Ok(()) => ApiResponse::success(serde_json::json!({ "trace_id": req.trace_id })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn freeze_status(State(state): State<AppState>, Path(trace_id): Path<String>) -> impl IntoResponse {
    match state.freezes.get_status(&trace_id).await {
        Some(freeze) => ApiResponse::success(freeze).into_response(),
        None => ApiResponse::<TraceFreeze>::error("not_found").into_response(),
    }
}

async fn list_active_freezes(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::success(state.freezes.list_active().await)
}

async fn get_snapshot(State(state): State<AppState>, Path(trace_id): Path<String>) -> impl IntoResponse {
    match state.snapshots.get_network(&trace_id).await {
        Some(snapshot) => ApiResponse::success(snapshot).into_response(),
        None => ApiResponse::<()>::error("not_found").into_response(),
    }
}

async fn get_app_snapshot(State(state): State<AppState>, Path(trace_id): Path<String>) -> impl IntoResponse {
    ApiResponse::success(state.snapshots.get_app(&trace_id).await)
}

#[derive(Debug, Serialize)]
struct EmergencyReleaseResponse {
    freed_count: usize,
    message: String,
}

async fn emergency_release(State(state): State<AppState>) -> impl IntoResponse {
    let freed_count = state.freezes.emergency_release().await;
    ApiResponse::success(EmergencyReleaseResponse {
        message: format!("released {freed_count} active freeze(s)"),
        freed_count,
    })
}

#[derive(Debug, Serialize)]
struct SystemHealth {
    healthy: bool,
    components: HashMap<String, String>,
}

async fn system_health(State(state): State<AppState>) -> impl IntoResponse {
    let service_health = state.snapshots.service_health().await;
    let mut components = HashMap::new();
    components.insert("freeze_registry".to_string(), "reachable".to_string());
    components.insert("breakpoint_registry".to_string(), "reachable".to_string());
    components.insert(
        "event_bus".to_string(),
        format!("{} subscriber(s)", state.events.subscriber_count().await),
    );

    if service_health.is_empty() {
        components.insert("snapshot_store".to_string(), "no_heartbeats_yet".to_string());
    } else {
        for (service, _) in service_health {
            components.insert(format!("service.{service}"), "active".to_string());
        }
    }

    ApiResponse::success(SystemHealth {
        healthy: true,
        components,
    })
}

async fn topology(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::success(state.snapshots.topology().await)
}

/// `StreamTraces` — server-streaming of live trace and freeze lifecycle
/// events. Implemented as SSE since the stack has no gRPC/tonic dependency
/// and SSE is the idiomatic axum way to expose a server-streaming RPC on the
/// same HTTP surface as everything else. The subscription is removed when
/// the client disconnects (stream drop).
async fn stream_traces(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (id, rx) = state.events.subscribe().await;
    let events = state.events.clone();

    let stream = ReceiverStream::new(rx).map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().data(payload))
    });

    struct Unsubscribe {
        events: waystation_core::EventBus,
        id: uuid::Uuid,
    }
    impl Drop for Unsubscribe {
        fn drop(&mut self) {
            let events = self.events.clone();
            let id = self.id;
            tokio::spawn(async move {
                events.unsubscribe(id).await;
            });
        }
    }
    let guard = Unsubscribe { events, id };

    Sse::new(stream.inspect(move |_| {
        let _ = &guard;
    }))
    .keep_alive(KeepAlive::default())
}
