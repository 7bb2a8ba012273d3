//! MCP request handlers: initialize and the three tools.

use pyinterp_core::protocol::{ExecutionRequest, PackageList};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::state::McpServer;

#[derive(Debug, Error)]
pub(super) enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[source] serde_json::Error),
    #[error("Failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),
}

pub(super) fn handle_initialize(_params: &Value) -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {}
        },
        "serverInfo": {
            "name": "pyinterp-mcp-server",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn to_text<T: Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string(value).map_err(ToolError::Encode)
}

/// `execute_python`: code failures are reported inside the result object,
/// not as tool errors.
pub(super) fn handle_execute_python(server: &McpServer, arguments: &Value) -> Result<String, ToolError> {
    let request: ExecutionRequest =
        serde_json::from_value(arguments.clone()).map_err(ToolError::InvalidArguments)?;
    let result = server.interpreter.execute(&request);
    to_text(&result)
}

pub(super) fn handle_get_environment_info(server: &McpServer) -> Result<String, ToolError> {
    to_text(&server.interpreter.environment_info())
}

pub(super) fn handle_list_preinstalled_packages(server: &McpServer) -> Result<String, ToolError> {
    to_text(&PackageList {
        packages: server.interpreter.list_preinstalled(),
    })
}
