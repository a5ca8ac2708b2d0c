//! MCP (Model Context Protocol) server module.
//!
//! Provides a JSON-RPC 2.0 over STDIO interface exposing the geocoding
//! tools to AI agents.

pub mod server;
pub mod tools;
pub mod types;

pub use server::Server;
pub use tools::ToolDispatcher;
