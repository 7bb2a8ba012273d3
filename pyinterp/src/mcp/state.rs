//! MCP server state.

use pyinterp_sandbox::PythonInterpreter;

/// Lives for the whole stdio session; install state accumulates across calls.
pub(super) struct McpServer {
    pub interpreter: PythonInterpreter,
}

impl McpServer {
    pub fn new(interpreter: PythonInterpreter) -> Self {
        Self { interpreter }
    }
}
