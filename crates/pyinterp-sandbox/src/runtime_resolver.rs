//! Locate the Python interpreter that installs and executions run under.
//!
//! An explicitly configured interpreter wins; otherwise the first of
//! `python3` / `python` found on PATH is used.

use std::path::PathBuf;

use thiserror::Error;

/// Candidates searched on PATH, in order.
pub const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configured Python interpreter {0:?} not found")]
    ConfiguredNotFound(String),
    #[error("python3 or python not found in PATH")]
    NotOnPath,
}

/// Resolved interpreter plus any extra environment the child should see.
#[derive(Debug, Clone)]
pub struct ResolvedRuntime {
    pub interpreter: PathBuf,
    pub extra_env: Vec<(String, String)>,
}

impl ResolvedRuntime {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            extra_env: vec![
                // Keep child output unbuffered and free of .pyc litter in the install dir.
                ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
                ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ],
        }
    }
}

/// Resolve the interpreter. `configured` may be a bare command name (looked
/// up on PATH) or a path.
pub fn resolve_python(configured: Option<&str>) -> Result<ResolvedRuntime, RuntimeError> {
    if let Some(name) = configured {
        return which::which(name)
            .map(ResolvedRuntime::new)
            .map_err(|_| RuntimeError::ConfiguredNotFound(name.to_string()));
    }
    PYTHON_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .map(ResolvedRuntime::new)
        .ok_or(RuntimeError::NotOnPath)
}
