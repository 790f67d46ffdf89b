use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use waystation_cli::ControlPlaneClient;

#[derive(Parser)]
#[command(name = "waystationctl")]
#[command(about = "Control-plane client for distributed breakpoints", long_about = None)]
struct Cli {
    /// Base URL of the control plane's RPC surface.
    #[arg(long, default_value = "http://127.0.0.1:9090", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a breakpoint rule.
    Register {
        #[arg(long)]
        service: String,
        #[arg(long)]
        endpoint: String,
        /// Repeatable `key=value` condition pair.
        #[arg(long = "condition", value_parser = parse_condition)]
        conditions: Vec<(String, String)>,
    },

    /// List all registered breakpoints.
    List,

    /// Delete a breakpoint by id.
    Delete {
        id: String,
    },

    /// Manually freeze a trace.
    Freeze {
        trace_id: String,
        #[arg(long = "service")]
        services: Vec<String>,
    },

    /// Release a frozen trace, optionally replacing the request body.
    Release {
        trace_id: String,
        #[arg(long)]
        override_body: Option<String>,
    },

    /// Show a trace's freeze status.
    Status {
        trace_id: String,
    },

    /// List every currently active freeze.
    Active,

    /// Fetch the captured network snapshot for a trace.
    Snapshot {
        trace_id: String,
    },

    /// Fetch the ordered application snapshots ("hop journey") for a trace.
    AppSnapshot {
        trace_id: String,
    },

    /// Release every active freeze immediately.
    EmergencyRelease,

    /// Show control-plane component health.
    Health,

    /// Show the derived service topology.
    Topology,
}

fn parse_condition(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) => Ok((k.to_string(), v.to_string())),
        None => Err(format!("expected `key=value`, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ControlPlaneClient::new(cli.server);

    let result = match cli.command {
        Commands::Register { service, endpoint, conditions } => {
            let conditions: HashMap<String, String> = conditions.into_iter().collect();
            client
                .register_breakpoint(&service, &endpoint, serde_json::to_value(conditions)?)
                .await?
        }
        Commands::List => client.list_breakpoints().await?,
        Commands::Delete { id } => client.delete_breakpoint(&id).await?,
        Commands::Freeze { trace_id, services } => client.freeze_trace(&trace_id, services).await?,
        Commands::Release { trace_id, override_body } => client.release_trace(&trace_id, override_body).await?,
        Commands::Status { trace_id } => client.freeze_status(&trace_id).await?,
        Commands::Active => client.list_active_freezes().await?,
        Commands::Snapshot { trace_id } => client.get_snapshot(&trace_id).await?,
        Commands::AppSnapshot { trace_id } => client.get_app_snapshot(&trace_id).await?,
        Commands::EmergencyRelease => client.emergency_release().await?,
        Commands::Health => client.system_health().await?,
        Commands::Topology => client.topology().await?,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
