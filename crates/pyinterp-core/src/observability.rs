//! Observability: tracing init and the JSONL audit log.
//!
//! Uses config::ObservabilityConfig for PYINTERP_QUIET, LOG_LEVEL, LOG_JSON, AUDIT_LOG.
//! Log output always goes to stderr; stdout belongs to the MCP channel.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
/// When PYINTERP_QUIET=1 only WARN and above are logged. RUST_LOG wins over
/// PYINTERP_LOG_LEVEL when set.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "pyinterp=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

/// SHA256 hex digest of a code snippet, used to correlate audit records
/// without storing the code itself.
pub fn code_hash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: execution_started (after dependency setup, before the guard)
pub fn audit_execution_started(execution_id: &str, code: &str, requirements: &[String]) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_started",
            "execution_id": execution_id,
            "code_hash": code_hash(code),
            "code_len": code.len(),
            "requirements": requirements,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: execution_completed
pub fn audit_execution_completed(
    execution_id: &str,
    success: bool,
    duration_ms: u64,
    stdout_len: usize,
) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_completed",
            "execution_id": execution_id,
            "success": success,
            "duration_ms": duration_ms,
            "stdout_len": stdout_len,
        });
        append_jsonl(&path, &record);
    }
}

/// Security event: code rejected by the denylist
pub fn security_blocked_code(execution_id: &str, pattern: &str) {
    tracing::warn!(
        execution_id = %execution_id,
        pattern = %pattern,
        "Security: blocked dangerous operation"
    );
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "security_blocked",
            "category": "code_guard",
            "execution_id": execution_id,
            "pattern": pattern,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: package install finished (either way)
pub fn audit_package_install(package: &str, success: bool, message: &str) {
    if let Some(path) = get_audit_path() {
        let event = if success {
            "package_installed"
        } else {
            "package_install_failed"
        };
        let record = json!({
            "ts": now(),
            "event": event,
            "package": package,
            "message": message,
        });
        append_jsonl(&path, &record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_hash_is_stable_sha256() {
        assert_eq!(code_hash("result = 2 + 2"), code_hash("result = 2 + 2"));
        assert_ne!(code_hash("result = 2 + 2"), code_hash("result = 2 + 3"));
        assert_eq!(code_hash("").len(), 64);
    }

    #[test]
    fn test_append_jsonl_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let path_str = path.to_string_lossy().to_string();
        append_jsonl(&path_str, &json!({"event": "a"}));
        append_jsonl(&path_str, &json!({"event": "b"}));
        let content = std::fs::read_to_string(&path).unwrap();
        let events: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["event"].to_string())
            .collect();
        assert_eq!(events, vec!["\"a\"", "\"b\""]);
    }
}
