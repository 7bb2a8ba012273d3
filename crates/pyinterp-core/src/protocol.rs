//! Request/result shapes shared by the interpreter facade, the MCP server and
//! the CLI. Field names are part of the external contract.

use serde::{Deserialize, Deserializer, Serialize};

// ─── Input ───────────────────────────────────────────────────────────────────

/// One `execute_python` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Python source to run. Must not be blank.
    pub code: String,
    /// Libraries the code expects to import. `null` and absent both mean none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub requirements: Vec<String>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            requirements: Vec::new(),
        }
    }

    pub fn with_requirements<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements = requirements.into_iter().map(Into::into).collect();
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// Prefix of `result` when the denylist rejected the code.
pub const SECURITY_ERROR_PREFIX: &str = "Security Error: ";
/// Prefix of `result` when the code (or the interpreter) failed.
pub const EXECUTION_ERROR_PREFIX: &str = "Execution Error: ";

/// Structured outcome of `execute_python`. Every failure path, including
/// security rejections, converges on this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// String form of the `result` binding, the success marker, or the
    /// classified failure message.
    pub result: String,
    pub stdout: String,
    pub stderr: String,
    /// Aggregated dependency install warnings; empty when none.
    pub warnings: String,
}

impl ExecutionResult {
    pub fn completed(result: String, stdout: String, stderr: String, warnings: String) -> Self {
        Self {
            success: true,
            result,
            stdout,
            stderr,
            warnings,
        }
    }

    /// Denylist rejection: nothing ran, so stdout is empty.
    pub fn security_error(reason: &str, warnings: String) -> Self {
        Self {
            success: false,
            result: format!("{}{}", SECURITY_ERROR_PREFIX, reason),
            stdout: String::new(),
            stderr: reason.to_string(),
            warnings,
        }
    }

    /// Runtime failure. `stderr` is whatever was captured before the failure
    /// followed by the failure message, so it is never empty.
    pub fn execution_error(message: &str, stdout: String, stderr: String, warnings: String) -> Self {
        let mut stderr = stderr;
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(message);
        Self {
            success: false,
            result: format!("{}{}", EXECUTION_ERROR_PREFIX, message),
            stdout,
            stderr,
            warnings,
        }
    }
}

/// `get_environment_info` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub python_version: String,
    pub platform: String,
    /// Isolated install directory.
    pub temp_dir: String,
    /// Packages installed during this process lifetime, sorted.
    pub installed_packages: Vec<String>,
}

/// `list_preinstalled_packages` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageList {
    pub packages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requirements_null_or_missing() {
        let missing: ExecutionRequest = serde_json::from_str(r#"{"code": "x = 1"}"#).unwrap();
        let null: ExecutionRequest =
            serde_json::from_str(r#"{"code": "x = 1", "requirements": null}"#).unwrap();
        assert!(missing.requirements.is_empty());
        assert!(null.requirements.is_empty());

        let given: ExecutionRequest =
            serde_json::from_str(r#"{"code": "x = 1", "requirements": ["httpx"]}"#).unwrap();
        assert_eq!(given.requirements, vec!["httpx".to_string()]);
    }

    #[test]
    fn test_security_error_shape() {
        let r = ExecutionResult::security_error(
            "Blocked dangerous operation: os.system",
            String::new(),
        );
        assert!(!r.success);
        assert_eq!(r.result, "Security Error: Blocked dangerous operation: os.system");
        assert!(r.stdout.is_empty());
        assert_eq!(r.stderr, "Blocked dangerous operation: os.system");
    }

    #[test]
    fn test_execution_error_appends_message_to_captured_stderr() {
        let r = ExecutionResult::execution_error(
            "ZeroDivisionError: division by zero",
            "partial\n".to_string(),
            "warning: something".to_string(),
            "w".to_string(),
        );
        assert!(r.result.starts_with(EXECUTION_ERROR_PREFIX));
        assert_eq!(r.stdout, "partial\n");
        assert_eq!(r.stderr, "warning: something\nZeroDivisionError: division by zero");
        assert_eq!(r.warnings, "w");

        let bare = ExecutionResult::execution_error("boom", String::new(), String::new(), String::new());
        assert_eq!(bare.stderr, "boom");
    }

    #[test]
    fn test_result_serializes_contract_field_names() {
        let r = ExecutionResult::completed("4".into(), String::new(), String::new(), String::new());
        let v = serde_json::to_value(&r).unwrap();
        for key in ["success", "result", "stdout", "stderr", "warnings"] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
    }
}
