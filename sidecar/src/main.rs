use anyhow::Result;
use axum::routing::any;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;
use waystation_sidecar::{CheckClient, SidecarConfig, SidecarState};

/// Waystation sidecar: the per-service intercept filter. Suspends requests
/// carrying a recognized trace id at the control plane's direction, then
/// forwards to the real upstream.
#[derive(Parser, Debug)]
#[command(name = "waystation-sidecar", version, about)]
struct Cli {
    /// Path to a TOML config file. Missing/unreadable falls back to defaults.
    #[arg(long, default_value = "sidecar.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SidecarConfig::from_file_or_default(&cli.config);
    config.validate()?;
    init_logging(&config);

    let check_client = CheckClient::new(
        config.control_plane_url.clone(),
        Duration::from_millis(config.dispatch_timeout_ms),
    )?;
    let state = SidecarState::new(
        check_client,
        config.upstream_url.clone(),
        Duration::from_millis(config.poll_interval_ms),
    )?;

    let addr: SocketAddr = format!("{}:{}", config.listen_host, config.listen_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, upstream = %config.upstream_url, control_plane = %config.control_plane_url, "waystation sidecar listening");

    let app = Router::new()
        .fallback(any(waystation_sidecar::intercept))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn init_logging(config: &SidecarConfig) {
    let level = if config.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).compact().init();
}
