//! Runs one snippet in a child interpreter and collects what it printed and
//! what it bound.
//!
//! One child per call keeps namespaces and stream redirection call-local.
//! There is no execution deadline: the call blocks until the snippet ends.

pub mod harness;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde_json::{json, Value};
use thiserror::Error;

use crate::common::{isolate_process_group, wait_with_timeout, ChildGuard, WaitOutcome};
use crate::runtime_resolver::ResolvedRuntime;
use harness::{parse_envelope, split_output, HARNESS};

/// `result` of a run that printed something but bound no `result`.
pub const SUCCESS_MARKER: &str = "executed successfully";

/// Name the snippet looks up to report an explicit result.
pub const RESULT_BINDING: &str = "result";

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The snippet raised. Output captured up to the failure is kept.
    #[error("{message}")]
    Raised {
        message: String,
        stdout: String,
        stderr: String,
    },
    /// The interpreter died without reporting an envelope.
    #[error("interpreter exited with code {code} before reporting a result")]
    Aborted {
        code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("failed to start Python interpreter: {0}")]
    Spawn(#[source] io::Error),
    #[error("I/O error talking to the interpreter: {0}")]
    Io(#[source] io::Error),
    #[error("malformed result envelope: {0}")]
    Envelope(#[source] serde_json::Error),
}

impl ExecutionError {
    pub fn partial_stdout(&self) -> &str {
        match self {
            ExecutionError::Raised { stdout, .. } | ExecutionError::Aborted { stdout, .. } => stdout.as_str(),
            _ => "",
        }
    }

    pub fn partial_stderr(&self) -> &str {
        match self {
            ExecutionError::Raised { stderr, .. } | ExecutionError::Aborted { stderr, .. } => stderr.as_str(),
            _ => "",
        }
    }
}

/// Bindings a snippet starts with. Always contains `__name__ = "__main__"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    bindings: BTreeMap<String, Value>,
}

impl Default for Namespace {
    fn default() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert("__name__".to_string(), Value::from("__main__"));
        Self { bindings }
    }
}

impl Namespace {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> &BTreeMap<String, Value> {
        &self.bindings
    }
}

/// Output of a snippet that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedRun {
    pub stdout: String,
    pub stderr: String,
    /// `str(result)`, the success marker, or empty.
    pub result: String,
    /// User-visible bindings left in the namespace, as their string forms.
    pub bindings: BTreeMap<String, String>,
}

pub struct CodeExecutor {
    runtime: ResolvedRuntime,
}

impl CodeExecutor {
    pub fn new(runtime: ResolvedRuntime) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &ResolvedRuntime {
        &self.runtime
    }

    fn command(&self, search_path: &[PathBuf]) -> io::Result<Command> {
        let mut cmd = Command::new(&self.runtime.interpreter);
        cmd.arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &self.runtime.extra_env {
            cmd.env(k, v);
        }
        if let Some(pythonpath) = python_path(search_path)? {
            cmd.env("PYTHONPATH", pythonpath);
        }
        isolate_process_group(&mut cmd);
        Ok(cmd)
    }

    /// Execute `code` in a fresh copy of `namespace`. `search_path` entries
    /// are importable ahead of everything else.
    pub fn run(
        &self,
        code: &str,
        namespace: &Namespace,
        search_path: &[PathBuf],
    ) -> Result<CapturedRun, ExecutionError> {
        let request = json!({ "code": code, "bindings": namespace.bindings() });
        let payload = serde_json::to_vec(&request).map_err(ExecutionError::Envelope)?;

        let child = self
            .command(search_path)
            .map_err(ExecutionError::Io)?
            .spawn()
            .map_err(ExecutionError::Spawn)?;
        let mut guard = ChildGuard::new(child);

        if let Some(mut stdin) = guard.child_mut().stdin.take() {
            match stdin.write_all(&payload) {
                Ok(()) => {}
                // Child already gone; the missing envelope reports it.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(ExecutionError::Io(e)),
            }
        }

        let output = match wait_with_timeout(&mut guard, None).map_err(ExecutionError::Io)? {
            WaitOutcome::Exited(output) => output,
            WaitOutcome::TimedOut { stdout, stderr } => {
                return Err(ExecutionError::Aborted {
                    code: -1,
                    stdout,
                    stderr,
                })
            }
        };

        let split = split_output(&output.stdout);
        let Some(body) = split.envelope else {
            return Err(ExecutionError::Aborted {
                code: output.exit_code,
                stdout: split.stray,
                stderr: output.stderr,
            });
        };
        let envelope = parse_envelope(body).map_err(ExecutionError::Envelope)?;

        let stdout = envelope.stdout + &split.stray;
        let stderr = envelope.stderr + &output.stderr;

        if !envelope.ok {
            return Err(ExecutionError::Raised {
                message: envelope.error.unwrap_or_else(|| "unknown error".to_string()),
                stdout,
                stderr,
            });
        }

        let result = match envelope.result {
            Some(value) => value,
            None if !stdout.is_empty() => SUCCESS_MARKER.to_string(),
            None => String::new(),
        };
        Ok(CapturedRun {
            stdout,
            stderr,
            result,
            bindings: envelope.bindings,
        })
    }
}

/// `search_path` (highest priority first) followed by any inherited PYTHONPATH.
fn python_path(search_path: &[PathBuf]) -> io::Result<Option<OsString>> {
    let inherited = std::env::var_os("PYTHONPATH");
    if search_path.is_empty() {
        return Ok(inherited);
    }
    let mut entries: Vec<PathBuf> = search_path.to_vec();
    if let Some(existing) = inherited.as_deref() {
        entries.extend(std::env::split_paths(existing));
    }
    std::env::join_paths(entries)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}
