//! Waypoint — geocoding tools for AI agents.
//!
//! Runs a JSON-RPC 2.0 server over STDIO that exposes forward and reverse
//! geocoding through the Model Context Protocol (MCP).
//!
//! Usage:
//!   waypoint [--config waypoint.toml]            # MCP server (default)
//!   waypoint geocode "Tokyo, Japan" --limit 1    # one-shot lookup
//!   waypoint reverse 35.6762 139.6503
//!   waypoint elevation 35.6893 -78.7767
//!   waypoint tools                               # print tool schemas

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use waypoint::cli::{Cli, Commands};
use waypoint::mcp::types::ToolsListResult;
use waypoint::{Server, ToolDispatcher, WaypointConfig};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing to stderr (MCP uses stdout for protocol)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => WaypointConfig::load(path)?,
        None => WaypointConfig::default(),
    };

    let command = cli.command.unwrap_or(Commands::Serve);
    if matches!(command, Commands::Elevation { .. }) {
        config.elevation.enabled = true;
        config.validate()?;
    }

    let dispatcher =
        ToolDispatcher::from_config(&config).context("failed to set up upstream clients")?;

    match command {
        Commands::Serve => {
            info!(
                version = env!("CARGO_PKG_VERSION"),
                "MCP server ready — waiting for JSON-RPC requests on stdin"
            );
            Server::new(dispatcher)
                .run_stdio()
                .context("MCP transport failed")?;
        }
        Commands::Tools => {
            let tools = ToolsListResult {
                tools: dispatcher.list_tools(),
            };
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        command => {
            if let Some((tool, args)) = command.tool_invocation() {
                let payload = dispatcher.call(tool, &args)?;
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }
    }

    Ok(())
}
