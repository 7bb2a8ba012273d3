//! Package fetcher: `python -m pip install --target <dir> --no-deps <name>`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::common::{isolate_process_group, wait_with_timeout, ChildGuard, WaitOutcome};
use crate::runtime_resolver::ResolvedRuntime;

/// Lines of pip stderr kept in a failure diagnostic.
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid package name {0:?}")]
    InvalidName(String),
    #[error("failed to start installer for {package}: {source}")]
    Spawn {
        package: String,
        #[source]
        source: io::Error,
    },
    #[error("installer for {package} exited with code {code}: {detail}")]
    Exited {
        package: String,
        code: i32,
        detail: String,
    },
    #[error("install of {package} timed out after {secs}s")]
    TimedOut { package: String, secs: u64 },
    #[error("I/O error while installing {package}: {source}")]
    Io {
        package: String,
        #[source]
        source: io::Error,
    },
}

/// Installs one named distribution into `target`. Implementations must be
/// safe to call from any thread; the resolver serializes calls.
pub trait PackageInstaller: Send + Sync {
    fn install(&self, name: &str, target: &Path) -> Result<(), InstallError>;
}

/// Only plain distribution names reach the fetcher: no options, URLs, paths
/// or version specifiers.
pub fn validate_package_name(name: &str) -> Result<(), InstallError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("package name regex is valid")
    });
    if re.is_match(name) {
        Ok(())
    } else {
        Err(InstallError::InvalidName(name.to_string()))
    }
}

/// Production installer: pip under the resolved interpreter, with a hard
/// deadline that kills the whole pip process group.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: PathBuf,
    extra_env: Vec<(String, String)>,
    timeout: Duration,
}

impl PipInstaller {
    pub fn new(runtime: &ResolvedRuntime, timeout: Duration) -> Self {
        Self {
            python: runtime.interpreter.clone(),
            extra_env: runtime.extra_env.clone(),
            timeout,
        }
    }

    fn command(&self, name: &str, target: &Path) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg("-m")
            .arg("pip")
            .arg("install")
            .arg("--target")
            .arg(target)
            .arg("--no-deps")
            .arg("--disable-pip-version-check")
            .arg("--no-input")
            .arg("--quiet")
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &self.extra_env {
            cmd.env(k, v);
        }
        isolate_process_group(&mut cmd);
        cmd
    }
}

impl PackageInstaller for PipInstaller {
    fn install(&self, name: &str, target: &Path) -> Result<(), InstallError> {
        validate_package_name(name)?;

        let child = self
            .command(name, target)
            .spawn()
            .map_err(|source| InstallError::Spawn {
                package: name.to_string(),
                source,
            })?;
        let mut guard = ChildGuard::new(child);
        tracing::debug!(package = %name, pid = guard.id(), "pip install started");

        match wait_with_timeout(&mut guard, Some(self.timeout)) {
            Ok(WaitOutcome::Exited(out)) if out.success() => Ok(()),
            Ok(WaitOutcome::Exited(out)) => Err(InstallError::Exited {
                package: name.to_string(),
                code: out.exit_code,
                detail: stderr_tail(&out.stderr),
            }),
            Ok(WaitOutcome::TimedOut { .. }) => Err(InstallError::TimedOut {
                package: name.to_string(),
                secs: self.timeout.as_secs(),
            }),
            Err(source) => Err(InstallError::Io {
                package: name.to_string(),
                source,
            }),
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return "no diagnostic output".to_string();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
