use crate::check_client::CheckClient;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use waystation_core::trace_id::extract_trace_id;

/// Per-request state the filter threads through a single request's
/// lifecycle. Never shared across requests — each inbound request gets its
/// own `RequestContext` and there is no sidecar-wide lock on it.
struct RequestContext {
    trace_id: String,
    method: Method,
    path: String,
    authority: String,
    original_headers: HashMap<String, String>,
    /// Guards against resending the network snapshot on a second or later
    /// `freeze` response in the same poll loop.
    sent_snapshot: bool,
}

#[derive(Clone)]
pub struct SidecarState {
    pub check_client: CheckClient,
    pub forward_client: Client,
    pub upstream_url: String,
    pub poll_interval: Duration,
}

impl SidecarState {
    pub fn new(check_client: CheckClient, upstream_url: String, poll_interval: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            check_client,
            forward_client: Client::builder().build()?,
            upstream_url,
            poll_interval,
        })
    }
}

const HOP_BY_HOP: &[&str] = &["connection", "content-length", "transfer-encoding", "host"];

/// The sidecar's single catch-all handler. Untagged requests (no recognized
/// trace id) bypass interception entirely and are forwarded unchanged —
/// zero added latency.
pub async fn intercept(State(state): State<SidecarState>, headers: HeaderMap, method: Method, uri: Uri, body: Bytes) -> Response {
    let Some(trace_id) = extract_trace_id(&headers) else {
        return forward_upstream(&state, &method, &uri, &headers, body).await;
    };

    let authority = headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let path = uri.path().to_string();
    let original_headers = collect_original_headers(&headers);

    let mut ctx = RequestContext {
        trace_id,
        method: method.clone(),
        path,
        authority,
        original_headers,
        sent_snapshot: false,
    };

    run_check_loop(&state, &mut ctx, &headers, &uri, body).await
}

fn collect_original_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !name.as_str().starts_with(':'))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

/// Long-polls `/check` until the decision is no longer `freeze`, then either
/// forwards upstream (possibly with a mutated body) or fails open on any
/// dispatch/decode error along the way.
async fn run_check_loop(
    state: &SidecarState,
    ctx: &mut RequestContext,
    inbound_headers: &HeaderMap,
    uri: &Uri,
    mut body: Bytes,
) -> Response {
    loop {
        let decision = match state
            .check_client
            .check(&ctx.trace_id, &ctx.authority, &ctx.path, &ctx.original_headers, &body)
            .await
        {
            Ok(decision) => decision,
            Err(err) => {
                warn!(trace_id = %ctx.trace_id, error = %err, "check dispatch failed, failing open");
                return forward_upstream(state, &ctx.method, uri, inbound_headers, body).await;
            }
        };

        if decision.is_freeze() {
            if !ctx.sent_snapshot {
                let method_and_path = format!("{} {}", ctx.method, ctx.path);
                let body_str = String::from_utf8_lossy(&body).to_string();
                if let Err(err) = state
                    .check_client
                    .send_snapshot(&ctx.trace_id, &ctx.authority, &method_and_path, &body_str)
                    .await
                {
                    warn!(trace_id = %ctx.trace_id, error = %err, "network snapshot dispatch failed");
                }
                ctx.sent_snapshot = true;
            }
            tokio::time::sleep(state.poll_interval).await;
            continue;
        }

        debug!(trace_id = %ctx.trace_id, "check resolved to allow");
        if let Some(override_body) = decision.override_body.filter(|b| !b.is_empty()) {
            body = Bytes::from(override_body.into_bytes());
        }
        return forward_upstream(state, &ctx.method, uri, inbound_headers, body).await;
    }
}

/// Forwards the (possibly mutated) request to the real upstream and relays
/// its response back verbatim. Used both for the fail-open path and for the
/// terminal `allow` decision.
async fn forward_upstream(state: &SidecarState, method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Response {
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{}{}", state.upstream_url, path_and_query);

    let mut request = state.forward_client.request(method.clone(), &url);
    for (name, value) in headers.iter() {
        if HOP_BY_HOP.contains(&name.as_str().to_lowercase().as_str()) {
            continue;
        }
        request = request.header(name.as_str(), value.as_bytes());
    }
    request = request.header("content-length", body.len().to_string());

    match request.body(body.to_vec()).send().await {
        Ok(upstream_response) => convert_response(upstream_response).await,
        Err(err) => {
            warn!(error = %err, upstream = %state.upstream_url, "upstream dispatch failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn convert_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.insert(name, value);
        }
    }

    let body = upstream.bytes().await.unwrap_or_default();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue as HttpHeaderValue;

    #[test]
    fn collects_non_pseudo_headers_only() {
        let mut headers = HeaderMap::new();
        headers.insert("user-type", HttpHeaderValue::from_static("vip"));
        headers.insert("x-trace-id", HttpHeaderValue::from_static("abc"));

        let collected = collect_original_headers(&headers);
        assert_eq!(collected.get("user-type").map(String::as_str), Some("vip"));
        assert_eq!(collected.get("x-trace-id").map(String::as_str), Some("abc"));
    }
}
