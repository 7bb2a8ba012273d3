//! Facade tying dependency setup, the guard and the executor into one
//! `execute` call, plus environment metadata.

use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use pyinterp_core::config::InterpreterConfig;
use pyinterp_core::observability;
use pyinterp_core::protocol::{EnvironmentInfo, ExecutionRequest, ExecutionResult};
use serde::Deserialize;

use crate::common::{isolate_process_group, wait_with_timeout, ChildGuard, WaitOutcome};
use crate::env::{DependencyResolver, PackageInstaller, PipInstaller};
use crate::executor::{CodeExecutor, Namespace};
use crate::info_log;
use crate::registry::LibraryRegistry;
use crate::runtime_resolver::{resolve_python, ResolvedRuntime, RuntimeError};
use crate::security::ExecutionGuard;

const RUNTIME_QUERY_TIMEOUT_SECS: u64 = 10;
const RUNTIME_QUERY_SCRIPT: &str = "import json, platform, sys; \
print(json.dumps({'python_version': sys.version, 'platform': platform.platform()}))";

/// Reported when the interpreter cannot be queried.
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Deserialize)]
struct RuntimeFacts {
    python_version: String,
    platform: String,
}

impl RuntimeFacts {
    fn fallback() -> Self {
        Self {
            python_version: UNKNOWN.to_string(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

/// Thread-safe interpreter service. Executions share only the resolver's
/// install state.
pub struct PythonInterpreter {
    resolver: DependencyResolver,
    guard: ExecutionGuard,
    executor: CodeExecutor,
    facts: OnceLock<RuntimeFacts>,
}

impl PythonInterpreter {
    /// Build from configuration: resolve the interpreter and wire pip as the
    /// installer. Fails only when no interpreter can be found.
    pub fn from_config(config: &InterpreterConfig) -> Result<Self, RuntimeError> {
        let runtime = resolve_python(config.python.as_deref())?;
        info_log!("Using Python interpreter {}", runtime.interpreter.display());
        let installer = Arc::new(PipInstaller::new(
            &runtime,
            Duration::from_secs(config.install_timeout_secs),
        ));
        Ok(Self::assemble(config, runtime, installer))
    }

    /// Same as [`from_config`](Self::from_config) with a caller-supplied installer.
    pub fn with_installer(
        config: &InterpreterConfig,
        installer: Arc<dyn PackageInstaller>,
    ) -> Result<Self, RuntimeError> {
        let runtime = resolve_python(config.python.as_deref())?;
        Ok(Self::assemble(config, runtime, installer))
    }

    fn assemble(
        config: &InterpreterConfig,
        runtime: ResolvedRuntime,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        let resolver = DependencyResolver::new(
            LibraryRegistry::with_extra(&config.extra_preinstalled),
            installer,
            config.packages_dir.clone(),
        );
        let guard = ExecutionGuard::with_extra_patterns(&config.extra_blocked_patterns);
        Self::new(runtime, resolver, guard)
    }

    pub fn new(runtime: ResolvedRuntime, resolver: DependencyResolver, guard: ExecutionGuard) -> Self {
        Self {
            resolver,
            guard,
            executor: CodeExecutor::new(runtime),
            facts: OnceLock::new(),
        }
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    /// Run one request. Never panics and never returns an error: every
    /// failure is folded into the result.
    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("execute", execution_id = %execution_id);
        let _enter = span.enter();
        let started = Instant::now();

        let warnings = if request.requirements.is_empty() {
            String::new()
        } else {
            self.resolver
                .setup_environment(&request.requirements)
                .warnings()
                .to_string()
        };
        if !warnings.is_empty() {
            tracing::warn!(%warnings, "dependency setup incomplete");
        }

        observability::audit_execution_started(&execution_id, &request.code, &request.requirements);
        let result = self.run_code(&execution_id, &request.code, warnings);
        let duration_ms = started.elapsed().as_millis() as u64;
        observability::audit_execution_completed(
            &execution_id,
            result.success,
            duration_ms,
            result.stdout.len(),
        );
        tracing::debug!(success = result.success, duration_ms, "execution finished");
        result
    }

    fn run_code(&self, execution_id: &str, code: &str, warnings: String) -> ExecutionResult {
        if code.trim().is_empty() {
            return ExecutionResult::execution_error(
                "code must not be empty",
                String::new(),
                String::new(),
                warnings,
            );
        }

        if let Err(violation) = self.guard.check(code) {
            observability::security_blocked_code(execution_id, &violation.pattern);
            return ExecutionResult::security_error(&violation.to_string(), warnings);
        }

        let search_path = self.resolver.search_path();
        match self.executor.run(code, &Namespace::default(), &search_path) {
            Ok(run) => ExecutionResult::completed(run.result, run.stdout, run.stderr, warnings),
            Err(e) => {
                tracing::debug!(error = %e, "snippet failed");
                ExecutionResult::execution_error(
                    &e.to_string(),
                    e.partial_stdout().to_string(),
                    e.partial_stderr().to_string(),
                    warnings,
                )
            }
        }
    }

    pub fn environment_info(&self) -> EnvironmentInfo {
        let facts = self.facts.get_or_init(|| self.query_runtime());
        EnvironmentInfo {
            python_version: facts.python_version.clone(),
            platform: facts.platform.clone(),
            temp_dir: self.resolver.install_dir().display().to_string(),
            installed_packages: self.resolver.installed(),
        }
    }

    pub fn list_preinstalled(&self) -> Vec<String> {
        self.resolver.registry().list_preinstalled()
    }

    fn query_runtime(&self) -> RuntimeFacts {
        let runtime = self.executor.runtime();
        let mut cmd = Command::new(&runtime.interpreter);
        cmd.arg("-c")
            .arg(RUNTIME_QUERY_SCRIPT)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut guard = match cmd.spawn() {
            Ok(child) => ChildGuard::new(child),
            Err(e) => {
                tracing::warn!("Could not query Python interpreter: {}", e);
                return RuntimeFacts::fallback();
            }
        };
        match wait_with_timeout(&mut guard, Some(Duration::from_secs(RUNTIME_QUERY_TIMEOUT_SECS))) {
            Ok(WaitOutcome::Exited(out)) if out.success() => {
                serde_json::from_str(out.stdout.trim()).unwrap_or_else(|e| {
                    tracing::warn!("Unreadable interpreter query output: {}", e);
                    RuntimeFacts::fallback()
                })
            }
            Ok(_) | Err(_) => RuntimeFacts::fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InstallError;
    use std::path::Path;

    struct NoopInstaller;

    impl PackageInstaller for NoopInstaller {
        fn install(&self, _name: &str, _target: &Path) -> Result<(), InstallError> {
            Ok(())
        }
    }

    fn offline(dir: &Path, python: &str) -> PythonInterpreter {
        let resolver = DependencyResolver::new(
            LibraryRegistry::default(),
            Arc::new(NoopInstaller),
            dir.join("pkgs"),
        );
        PythonInterpreter::new(ResolvedRuntime::new(python), resolver, ExecutionGuard::default())
    }

    #[test]
    fn test_empty_code_is_rejected_before_guard() {
        let dir = tempfile::tempdir().unwrap();
        let interp = offline(dir.path(), "/definitely/not/python");
        let r = interp.execute(&ExecutionRequest::new("   \n\t"));
        assert!(!r.success);
        assert_eq!(r.result, "Execution Error: code must not be empty");
        assert!(!r.stderr.is_empty());
    }

    #[test]
    fn test_security_error_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        // A missing interpreter would surface as a spawn failure if the executor ran.
        let interp = offline(dir.path(), "/definitely/not/python");
        let r = interp.execute(&ExecutionRequest::new("import os\nos.system('ls')"));
        assert!(!r.success);
        assert_eq!(r.result, "Security Error: Blocked dangerous operation: os.system");
        assert_eq!(r.stderr, "Blocked dangerous operation: os.system");
        assert!(r.stdout.is_empty());
    }

    #[test]
    fn test_spawn_failure_becomes_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let interp = offline(dir.path(), "/definitely/not/python");
        let r = interp.execute(&ExecutionRequest::new("result = 1"));
        assert!(!r.success);
        assert!(r.result.starts_with("Execution Error: failed to start Python interpreter"));
    }

    #[test]
    fn test_warnings_carried_into_result() {
        struct Failing;
        impl PackageInstaller for Failing {
            fn install(&self, name: &str, _target: &Path) -> Result<(), InstallError> {
                Err(InstallError::InvalidName(name.to_string()))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let resolver = DependencyResolver::new(
            LibraryRegistry::default(),
            Arc::new(Failing),
            dir.path().join("pkgs"),
        );
        let interp = PythonInterpreter::new(
            ResolvedRuntime::new("/definitely/not/python"),
            resolver,
            ExecutionGuard::default(),
        );
        let r = interp.execute(
            &ExecutionRequest::new("os.system('x')").with_requirements(["not-a-real-pkg"]),
        );
        assert!(r.warnings.starts_with("Failed to install not-a-real-pkg: "));
        assert!(r.result.starts_with("Security Error: "));
    }

    #[test]
    fn test_environment_info_falls_back_without_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let interp = offline(dir.path(), "/definitely/not/python");
        let info = interp.environment_info();
        assert_eq!(info.python_version, UNKNOWN);
        assert!(info.platform.contains(std::env::consts::OS));
        assert_eq!(info.temp_dir, dir.path().join("pkgs").display().to_string());
        assert!(info.installed_packages.is_empty());
    }

    #[test]
    fn test_list_preinstalled_matches_registry() {
        let dir = tempfile::tempdir().unwrap();
        let interp = offline(dir.path(), "/definitely/not/python");
        assert_eq!(
            interp.list_preinstalled(),
            LibraryRegistry::default().list_preinstalled()
        );
    }
}
