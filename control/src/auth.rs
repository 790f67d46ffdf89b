use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use waystation_core::config::ControlPlaneConfig;

use crate::response::ApiResponse;
use crate::state::AppState;

type KeyedRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Optional API-key auth and per-key rate limiting on the RPC surface. The
/// sidecar-facing `/check` path never goes through this middleware: it's
/// mesh-internal, fail-open traffic, and gating it on a key would contradict
/// the fail-open invariant under a misconfigured key.
#[derive(Clone)]
pub struct AuthConfig {
    enabled: bool,
    valid_keys: Arc<HashSet<String>>,
    rate_limiter: Option<Arc<KeyedRateLimiter>>,
}

impl AuthConfig {
    pub fn from_control_plane_config(cfg: &ControlPlaneConfig) -> Self {
        let valid_keys: HashSet<String> = cfg.api_keys.iter().cloned().collect();

        let rate_limiter = if cfg.rate_limit_enabled {
            NonZeroU32::new(cfg.rate_limit_rpm).map(|rpm| Arc::new(RateLimiter::keyed(Quota::per_minute(rpm))))
        } else {
            None
        };

        Self {
            enabled: cfg.auth_enabled,
            valid_keys: Arc::new(valid_keys),
            rate_limiter,
        }
    }

    fn is_authorized(&self, provided: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        provided.map(|key| self.valid_keys.contains(key)).unwrap_or(false)
    }

    fn check_rate_limit(&self, key: &str) -> bool {
        match &self.rate_limiter {
            Some(limiter) => limiter.check_key(&key.to_string()).is_ok(),
            None => true,
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let headers = req.headers().clone();
    let api_key = extract_api_key(&headers);

    if !state.auth.is_authorized(api_key.as_deref()) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error("unauthorized")),
        )
            .into_response());
    }

    let limiter_key = extract_client_identifier(&req, &headers, api_key.as_deref());
    if !state.auth.check_rate_limit(&limiter_key) {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error("too many requests")),
        )
            .into_response());
    }

    Ok(next.run(req).await)
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer ")) {
                return Some(token.trim().to_string());
            }
        }
    }

    headers
        .get("x-waystation-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_client_identifier(req: &Request<Body>, headers: &HeaderMap, api_key: Option<&str>) -> String {
    if let Some(key) = api_key {
        return key.to_string();
    }

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
