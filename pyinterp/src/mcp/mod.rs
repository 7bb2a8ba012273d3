//! MCP (Model Context Protocol) server over stdio.
//!
//! Line-delimited JSON-RPC 2.0. Exposes three tools: execute_python,
//! get_environment_info, list_preinstalled_packages.
//!
//! Protocol flow:
//!   1. Client sends `initialize` → server returns capabilities
//!   2. Client sends `notifications/initialized`
//!   3. Client sends `tools/list` → server returns the tool definitions
//!   4. Client sends `tools/call` → server runs the tool, returns one text item
//!
//! Requests are handled one at a time; an `execute_python` call blocks the
//! loop until the snippet finishes.

mod handlers;
mod state;
mod tools;

use anyhow::Result;
use serde_json::{json, Value};
use std::io::{self, BufRead, BufReader, Write};
use thiserror::Error;

use handlers::{
    handle_execute_python, handle_get_environment_info, handle_initialize,
    handle_list_preinstalled_packages, ToolError,
};
use pyinterp_sandbox::PythonInterpreter;
use state::McpServer;
use tools::{get_mcp_tools, EXECUTE_PYTHON, GET_ENVIRONMENT_INFO, LIST_PREINSTALLED_PACKAGES};

/// Maximum JSON-RPC request size (10 MB).
const MAX_REQUEST_SIZE: usize = 10 * 1024 * 1024;

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;

// ─── Size-limited line reader ────────────────────────────────────────────────

#[derive(Debug, Error)]
enum LineError {
    #[error("Request exceeds {0} byte size limit")]
    TooLarge(usize),
    #[error("Invalid UTF-8")]
    InvalidUtf8,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read one line, enforcing `limit`. `Ok(None)` on EOF. An oversized line
/// is discarded up to its newline.
fn read_line_limited(reader: &mut impl BufRead, limit: usize) -> Result<Option<String>, LineError> {
    let mut buf = Vec::new();
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if available.is_empty() {
            return if buf.is_empty() { Ok(None) } else { finish_line(buf).map(Some) };
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if buf.len() + pos > limit {
                    reader.consume(pos + 1);
                    return Err(LineError::TooLarge(limit));
                }
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                return finish_line(buf).map(Some);
            }
            None => {
                let len = available.len();
                if buf.len() + len > limit {
                    reader.consume(len);
                    skip_until_newline(reader);
                    return Err(LineError::TooLarge(limit));
                }
                buf.extend_from_slice(available);
                reader.consume(len);
            }
        }
    }
}

fn finish_line(mut buf: Vec<u8>) -> Result<String, LineError> {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| LineError::InvalidUtf8)
}

fn skip_until_newline(reader: &mut impl BufRead) {
    loop {
        match reader.fill_buf() {
            Ok(b) if b.is_empty() => break,
            Ok(b) => {
                if let Some(pos) = b.iter().position(|&c| c == b'\n') {
                    reader.consume(pos + 1);
                    break;
                }
                let len = b.len();
                reader.consume(len);
            }
            Err(_) => break,
        }
    }
}

// ─── Server loop ─────────────────────────────────────────────────────────────

/// Entry point for `pyinterp mcp`.
pub fn serve_mcp_stdio(interpreter: PythonInterpreter) -> Result<()> {
    let server = McpServer::new(interpreter);
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let mut stdout = io::stdout();
    tracing::info!("MCP server ready on stdio");
    serve(&server, &mut reader, &mut stdout, MAX_REQUEST_SIZE)
}

fn serve(
    server: &McpServer,
    reader: &mut impl BufRead,
    out: &mut impl Write,
    limit: usize,
) -> Result<()> {
    loop {
        let line = match read_line_limited(reader, limit) {
            Ok(None) => break,
            Ok(Some(l)) => l,
            Err(LineError::TooLarge(limit)) => {
                let resp = error_response(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("Request size error: {}", LineError::TooLarge(limit)),
                );
                write_message(out, &resp)?;
                continue;
            }
            Err(LineError::InvalidUtf8) => {
                let resp = error_response(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", LineError::InvalidUtf8),
                );
                write_message(out, &resp)?;
                continue;
            }
            Err(LineError::Io(e)) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                let resp = error_response(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
                write_message(out, &resp)?;
                continue;
            }
        };

        if let Some(resp) = handle_request(server, &request) {
            write_message(out, &resp)?;
        }
    }
    Ok(())
}

/// Dispatch one decoded request. `None` means nothing is sent back
/// (notifications).
fn handle_request(server: &McpServer, request: &Value) -> Option<Value> {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or(json!({}));
    tracing::debug!(method, "MCP request");

    let result = match method {
        // ─── Lifecycle ──────────────────────────────────────────────
        "initialize" => handle_initialize(&params),
        "notifications/initialized" | "initialized" => return None,
        "ping" => json!({}),

        // ─── Tools ─────────────────────────────────────────────────
        "tools/list" => json!({ "tools": get_mcp_tools() }),
        "tools/call" => call_tool(server, &params),

        // ─── Resources / Prompts (none offered) ─────────────────────
        "resources/list" => json!({ "resources": [] }),
        "prompts/list" => json!({ "prompts": [] }),

        // ─── Unknown ────────────────────────────────────────────────
        _ => {
            // Unknown notifications (no id) are ignored.
            return id.map(|id| {
                error_response(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
            });
        }
    };

    id.map(|id| success_response(id, result))
}

fn call_tool(server: &McpServer, params: &Value) -> Value {
    let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    let result = match tool_name {
        EXECUTE_PYTHON => handle_execute_python(server, &arguments),
        GET_ENVIRONMENT_INFO => handle_get_environment_info(server),
        LIST_PREINSTALLED_PACKAGES => handle_list_preinstalled_packages(server),
        _ => Err(ToolError::UnknownTool(tool_name.to_string())),
    };

    match result {
        Ok(content) => json!({
            "content": [{"type": "text", "text": content}],
            "isError": false
        }),
        Err(e) => {
            tracing::warn!(tool = tool_name, error = %e, "MCP tool call rejected");
            json!({
                "content": [{"type": "text", "text": format!("Error: {}", e)}],
                "isError": true
            })
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}

fn write_message(out: &mut impl Write, message: &Value) -> Result<()> {
    writeln!(out, "{}", message)?;
    out.flush()?;
    Ok(())
}
