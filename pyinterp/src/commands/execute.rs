//! exec / env / packages.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use pyinterp_core::config::InterpreterConfig;
use pyinterp_core::protocol::{EnvironmentInfo, ExecutionRequest, ExecutionResult, PackageList};
use pyinterp_sandbox::registry::LibraryRegistry;
use pyinterp_sandbox::PythonInterpreter;

/// Snippet text from `--code`, `--file`, or else all of `stdin`.
pub fn read_snippet(code: Option<String>, file: Option<&Path>, mut stdin: impl Read) -> Result<String> {
    if let Some(code) = code {
        return Ok(code);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snippet from {}", path.display()));
    }
    let mut buf = String::new();
    stdin
        .read_to_string(&mut buf)
        .context("Failed to read snippet from stdin")?;
    Ok(buf)
}

pub fn exec_snippet(
    interpreter: &PythonInterpreter,
    code: String,
    requirements: Vec<String>,
) -> ExecutionResult {
    let request = ExecutionRequest {
        code,
        requirements,
    };
    interpreter.execute(&request)
}

pub fn environment_info(interpreter: &PythonInterpreter) -> EnvironmentInfo {
    interpreter.environment_info()
}

/// Registry listing; needs no interpreter.
pub fn preinstalled_packages(config: &InterpreterConfig) -> PackageList {
    PackageList {
        packages: LibraryRegistry::with_extra(&config.extra_preinstalled).list_preinstalled(),
    }
}
