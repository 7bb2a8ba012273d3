//! MCP tool definitions.

use serde_json::{json, Value};

pub(super) const EXECUTE_PYTHON: &str = "execute_python";
pub(super) const GET_ENVIRONMENT_INFO: &str = "get_environment_info";
pub(super) const LIST_PREINSTALLED_PACKAGES: &str = "list_preinstalled_packages";

pub(super) fn get_mcp_tools() -> Vec<Value> {
    vec![
        json!({
            "name": EXECUTE_PYTHON,
            "description": "Execute Python code and return the result. Assign to `result` to return a value; printed output is returned as stdout. Libraries listed in `requirements` that are not preinstalled are installed first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Python source to execute"
                    },
                    "requirements": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Libraries the code imports (optional)"
                    }
                },
                "required": ["code"]
            }
        }),
        json!({
            "name": GET_ENVIRONMENT_INFO,
            "description": "Get Python environment information: interpreter version, platform, install directory and packages installed this session.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        }),
        json!({
            "name": LIST_PREINSTALLED_PACKAGES,
            "description": "List available preinstalled packages.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        }),
    ]
}
