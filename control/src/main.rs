use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use waystation_control::{build_rpc_router, build_sidecar_router, AppState};
use waystation_core::Config;

/// Waystation control plane: freeze coordinator, match engine, snapshot
/// aggregator, and the RPC surface the CLI talks to.
#[derive(Parser, Debug)]
#[command(name = "waystation-control", version, about)]
struct Cli {
    /// Path to a TOML config file. Missing/unreadable falls back to defaults.
    #[arg(long, default_value = "waystation.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_file_or_default(&cli.config);
    config.validate()?;
    init_logging(&config);

    let state = AppState::new(config.clone());

    let sidecar_addr: SocketAddr =
        format!("{}:{}", config.control_plane.host, config.control_plane.sidecar_port).parse()?;
    let rpc_addr: SocketAddr =
        format!("{}:{}", config.control_plane.host, config.control_plane.rpc_port).parse()?;

    let sidecar_listener = tokio::net::TcpListener::bind(sidecar_addr).await?;
    let rpc_listener = tokio::net::TcpListener::bind(rpc_addr).await?;

    info!(%sidecar_addr, %rpc_addr, "waystation control plane listening");

    let sidecar_app = build_sidecar_router(state.clone());
    let rpc_app = build_rpc_router(state);

    let sidecar_server = axum::serve(
        sidecar_listener,
        sidecar_app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    let rpc_server = axum::serve(
        rpc_listener,
        rpc_app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    tokio::try_join!(sidecar_server, rpc_server)?;
    Ok(())
}

fn init_logging(config: &Config) {
    let level = match config.logging.level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_target(config.logging.include_modules)
        .with_max_level(level)
        .compact()
        .init();
}
