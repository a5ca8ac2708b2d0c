//! MCP JSON-RPC 2.0 server — reads requests from a byte stream, writes
//! responses back.
//!
//! The MCP protocol uses newline-delimited JSON over STDIO.
//! Tracing output goes to stderr so it doesn't interfere with the protocol.
//!
//! Requests are handled strictly one at a time: an invocation (including
//! any rate-limit wait and upstream retries) finishes before the next line
//! is read, so upstream calls go out in the order requests arrived.

use std::io::{self, BufRead, Write};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::tools::ToolDispatcher;
use super::types::*;

pub const PROTOCOL_VERSION: &str = "2025-06-18";
pub const SERVER_NAME: &str = "waypoint";

/// Whether the loop keeps reading after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

pub struct Server {
    dispatcher: ToolDispatcher,
}

impl Server {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Serve on stdin/stdout until stdin closes or a shutdown arrives.
    pub fn run_stdio(&self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }

    /// Run the loop over any line-oriented reader and writer.
    ///
    /// Returns `Ok(())` on end of input or shutdown. Read and write failures
    /// end the loop with the error; malformed messages never do.
    pub fn run<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> io::Result<()> {
        info!("MCP server starting");

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|e| {
                error!(error = %e, "failed to read request stream");
                e
            })?;
            if read == 0 {
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(error = %e, "request is not valid UTF-8");
                    let response =
                        JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                    write_response(&mut writer, &response)?;
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            debug!(request = %line, "received request");

            let (response, flow) = self.handle_line(line);
            if let Some(response) = response {
                write_response(&mut writer, &response)?;
            }
            if flow == Flow::Shutdown {
                info!("shutdown requested");
                break;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    fn handle_line(&self, line: &str) -> (Option<JsonRpcResponse>, Flow) {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "invalid JSON");
                let response =
                    JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                return (Some(response), Flow::Continue);
            }
        };

        let id = value.get("id").cloned();
        // An explicit null id deserializes to `None`, same as a notification.
        if id == Some(Value::Null) {
            warn!("request with null id");
            let response = JsonRpcResponse::error(
                None,
                INVALID_REQUEST,
                "Invalid request: id must be a string or number".to_string(),
            );
            return (Some(response), Flow::Continue);
        }

        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                let response = JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                );
                return (Some(response), Flow::Continue);
            }
        };

        if request.jsonrpc != "2.0" {
            let response = JsonRpcResponse::error(
                request.id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            );
            return (Some(response), Flow::Continue);
        }

        if request.is_notification() {
            return (None, self.handle_notification(&request));
        }

        self.handle_request(&request)
    }

    fn handle_notification(&self, request: &JsonRpcRequest) -> Flow {
        match request.method.as_str() {
            "notifications/initialized" => {
                info!("client initialized");
                Flow::Continue
            }
            "exit" => Flow::Shutdown,
            method => {
                debug!(method, "ignoring notification");
                Flow::Continue
            }
        }
    }

    /// Handle a single JSON-RPC request that expects a response.
    fn handle_request(&self, request: &JsonRpcRequest) -> (Option<JsonRpcResponse>, Flow) {
        let id = request.id.clone();

        let response = match request.method.as_str() {
            "initialize" => {
                let params: InitializeParams =
                    serde_json::from_value(request.params.clone()).unwrap_or_default();
                info!(
                    client = params.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
                    client_version = params
                        .client_info
                        .as_ref()
                        .and_then(|c| c.version.as_deref())
                        .unwrap_or("unknown"),
                    requested_protocol = params.protocol_version.as_deref().unwrap_or("unspecified"),
                    "client initializing"
                );
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: ToolCapability {},
                    },
                    server_info: ServerInfo {
                        name: SERVER_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                JsonRpcResponse::success(id, to_value(result))
            }

            "tools/list" => {
                debug!("listing tools");
                let result = ToolsListResult {
                    tools: self.dispatcher.list_tools(),
                };
                JsonRpcResponse::success(id, to_value(result))
            }

            "tools/call" => {
                let params = serde_json::from_value::<ToolsCallParams>(request.params.clone());
                let params = match params {
                    Ok(p) => p,
                    Err(e) => {
                        let response = JsonRpcResponse::error(
                            id,
                            INVALID_PARAMS,
                            format!("Invalid params: {}", e),
                        );
                        return (Some(response), Flow::Continue);
                    }
                };

                debug!(tool = %params.name, "calling tool");
                let result = self.dispatcher.call_tool(&params.name, &params.arguments);
                JsonRpcResponse::success(id, to_value(result))
            }

            "ping" => JsonRpcResponse::success(id, Value::Object(Default::default())),

            "shutdown" => {
                return (Some(JsonRpcResponse::success(id, Value::Null)), Flow::Shutdown);
            }

            _ => {
                warn!(method = %request.method, "unknown method");
                JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                )
            }
        };

        (Some(response), Flow::Continue)
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Write a JSON-RPC response (newline-delimited) and flush.
fn write_response(writer: &mut impl Write, response: &JsonRpcResponse) -> io::Result<()> {
    let json = serde_json::to_string(response).unwrap_or_default();
    debug!(response = %json, "sending response");
    writeln!(writer, "{}", json)?;
    writer.flush()
}
