//! CLI module for Waypoint.
//!
//! Commands:
//! - Server: serve (default)
//! - One-shot lookups: geocode, reverse, elevation
//! - Discovery: tools

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::mcp::tools::{GEOCODE, GET_ELEVATION, REVERSE_GEOCODE};

#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(version, about = "Rate-limited geocoding tools for AI agents (MCP over stdio)")]
pub struct Cli {
    /// Path to a TOML config file (defaults are used if absent)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log filter when RUST_LOG is not set (logs go to stderr)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve,

    /// Look up coordinates for an address or place
    Geocode {
        /// Free-text address or place name
        query: String,

        /// Max results
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Look up the address nearest to a coordinate
    Reverse {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },

    /// Look up ground elevation at a coordinate
    Elevation {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        /// Elevation dataset (e.g. srtm90m, aster30m)
        #[arg(short, long)]
        dataset: Option<String>,
    },

    /// Print the tool schemas advertised to MCP clients
    Tools,
}

impl Commands {
    /// The tool name and arguments a one-shot command maps to, if any.
    pub fn tool_invocation(&self) -> Option<(&'static str, Value)> {
        match self {
            Commands::Geocode { query, limit } => {
                let mut args = json!({ "query": query });
                if let Some(limit) = limit {
                    args["limit"] = json!(limit);
                }
                Some((GEOCODE, args))
            }
            Commands::Reverse {
                latitude,
                longitude,
            } => Some((
                REVERSE_GEOCODE,
                json!({ "latitude": latitude, "longitude": longitude }),
            )),
            Commands::Elevation {
                latitude,
                longitude,
                dataset,
            } => {
                let mut args = json!({ "latitude": latitude, "longitude": longitude });
                if let Some(dataset) = dataset {
                    args["dataset"] = json!(dataset);
                }
                Some((GET_ELEVATION, args))
            }
            Commands::Serve | Commands::Tools => None,
        }
    }
}
