pub mod auth;
pub mod response;
pub mod rpc_api;
pub mod sidecar_api;
pub mod state;

use axum::http::Method;
use axum::middleware;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use waystation_core::Config;

pub use state::AppState;

/// Builds the sidecar-facing router (`/check`, `/snapshot`, `/app-snapshot`).
/// Deliberately carries no auth middleware — see [`auth`].
pub fn build_sidecar_router(state: AppState) -> Router {
    sidecar_api::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the RPC router for the CLI client surface, gated by the optional
/// API-key/rate-limit middleware and CORS per config.
pub fn build_rpc_router(state: AppState) -> Router {
    let cors = build_cors(&state.config);
    let rpc_state = state.clone();

    rpc_api::router()
        .layer(middleware::from_fn_with_state(rpc_state, auth::auth_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(config: &Config) -> CorsLayer {
    if !config.control_plane.cors_enabled {
        return CorsLayer::new();
    }

    if config.development.cors_allow_all || config.control_plane.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    }
}
