//! Requirement resolution and session install state.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use pyinterp_core::observability;

use super::installer::{InstallError, PackageInstaller};
use crate::info_log;
use crate::registry::LibraryRegistry;

/// Partition of one request's requirements. Duplicates collapse onto their
/// first occurrence, so `ready` and `installing` partition the input set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    pub ready: Vec<String>,
    pub installing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSetup {
    Ready,
    /// At least one install failed; `"Failed to install <pkg>: <message>"`
    /// entries joined by `"; "`.
    Warnings(String),
}

impl EnvironmentSetup {
    pub fn warnings(&self) -> &str {
        match self {
            EnvironmentSetup::Ready => "",
            EnvironmentSetup::Warnings(w) => w,
        }
    }
}

#[derive(Debug, Default)]
struct ResolverState {
    installed: BTreeSet<String>,
    /// Directories prepended to the executor's import path, highest priority first.
    search_path: Vec<PathBuf>,
}

/// Owns the session's install state. Installs are serialized by their own
/// lock, so concurrent requests for the same name fetch once, while the state
/// lock is only held for reads and the final bookkeeping.
pub struct DependencyResolver {
    registry: LibraryRegistry,
    installer: Arc<dyn PackageInstaller>,
    install_dir: PathBuf,
    install_lock: Mutex<()>,
    state: Mutex<ResolverState>,
}

impl DependencyResolver {
    pub fn new(
        registry: LibraryRegistry,
        installer: Arc<dyn PackageInstaller>,
        install_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            installer,
            install_dir: install_dir.into(),
            install_lock: Mutex::new(()),
            state: Mutex::new(ResolverState::default()),
        }
    }

    pub fn registry(&self) -> &LibraryRegistry {
        &self.registry
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    fn lock_state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Split requirements by registry membership. No network, no filesystem.
    pub fn resolve(&self, requirements: &[String]) -> ResolutionPlan {
        let mut seen = HashSet::new();
        let mut plan = ResolutionPlan::default();
        for name in requirements {
            if !seen.insert(name.as_str()) {
                continue;
            }
            if self.registry.is_preinstalled(name) {
                plan.ready.push(name.clone());
            } else {
                plan.installing.push(name.clone());
            }
        }
        plan
    }

    /// Install one library into the isolated directory. Names already
    /// installed this session succeed without fetching again.
    pub fn install(&self, name: &str) -> InstallOutcome {
        let _installing = self
            .install_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.lock_state().installed.contains(name) {
            return InstallOutcome {
                success: true,
                message: format!("{} already installed", name),
            };
        }

        let result = std::fs::create_dir_all(&self.install_dir)
            .map_err(|source| InstallError::Io {
                package: name.to_string(),
                source,
            })
            .and_then(|_| self.installer.install(name, &self.install_dir));

        let outcome = match result {
            Ok(()) => {
                let mut state = self.lock_state();
                if !state.search_path.contains(&self.install_dir) {
                    state.search_path.insert(0, self.install_dir.clone());
                }
                state.installed.insert(name.to_string());
                drop(state);
                info_log!("Installed {} into {}", name, self.install_dir.display());
                InstallOutcome {
                    success: true,
                    message: format!("Successfully installed {}", name),
                }
            }
            Err(e) => {
                tracing::warn!(package = %name, error = %e, "package install failed");
                InstallOutcome {
                    success: false,
                    message: e.to_string(),
                }
            }
        };

        observability::audit_package_install(name, outcome.success, &outcome.message);
        outcome
    }

    /// Make every requirement importable as far as possible. Failures become
    /// warnings; successful installs stay even when others fail.
    pub fn setup_environment(&self, requirements: &[String]) -> EnvironmentSetup {
        if requirements.is_empty() {
            return EnvironmentSetup::Ready;
        }
        let plan = self.resolve(requirements);
        tracing::debug!(
            ready = ?plan.ready,
            installing = ?plan.installing,
            "resolved requirements"
        );

        let failures: Vec<String> = plan
            .installing
            .iter()
            .filter_map(|name| {
                let outcome = self.install(name);
                (!outcome.success)
                    .then(|| format!("Failed to install {}: {}", name, outcome.message))
            })
            .collect();

        if failures.is_empty() {
            EnvironmentSetup::Ready
        } else {
            EnvironmentSetup::Warnings(failures.join("; "))
        }
    }

    /// Names installed during this process, sorted.
    pub fn installed(&self) -> Vec<String> {
        self.lock_state().installed.iter().cloned().collect()
    }

    /// Import search path additions, highest priority first.
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.lock_state().search_path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::installer::PipInstaller;
    use crate::runtime_resolver::ResolvedRuntime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Succeeds for every name except those listed in `fail`; counts calls.
    struct FakeInstaller {
        fail: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeInstaller {
        fn new(fail: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl PackageInstaller for FakeInstaller {
        fn install(&self, name: &str, _target: &Path) -> Result<(), InstallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.contains(&name) {
                Err(InstallError::Exited {
                    package: name.to_string(),
                    code: 1,
                    detail: "No matching distribution found".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn reqs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn resolver_with(installer: Arc<FakeInstaller>, dir: &Path) -> DependencyResolver {
        DependencyResolver::new(LibraryRegistry::default(), installer, dir.join("pkgs"))
    }

    #[test]
    fn test_resolve_partitions_input_set() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(FakeInstaller::new(vec![]), dir.path());
        let input = reqs(&["numpy", "httpx", "json", "httpx", "polars", "numpy"]);
        let plan = resolver.resolve(&input);

        assert_eq!(plan.ready, reqs(&["numpy", "json"]));
        assert_eq!(plan.installing, reqs(&["httpx", "polars"]));

        let union: BTreeSet<&String> = plan.ready.iter().chain(&plan.installing).collect();
        let expected: BTreeSet<&String> = input.iter().collect();
        assert_eq!(union, expected);
        assert!(plan.ready.iter().all(|r| !plan.installing.contains(r)));
    }

    #[test]
    fn test_resolve_does_not_touch_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(FakeInstaller::new(vec![]), dir.path());
        resolver.resolve(&reqs(&["httpx"]));
        assert!(!resolver.install_dir().exists());
    }

    #[test]
    fn test_install_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let installer = FakeInstaller::new(vec![]);
        let resolver = resolver_with(installer.clone(), dir.path());

        let first = resolver.install("httpx");
        let second = resolver.install("httpx");
        assert!(first.success);
        assert!(second.success);
        assert!(second.message.contains("already installed"));
        assert_eq!(installer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.installed(), reqs(&["httpx"]));
        assert_eq!(resolver.search_path(), vec![resolver.install_dir().to_path_buf()]);
    }

    #[test]
    fn test_search_path_registered_once_across_packages() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(FakeInstaller::new(vec![]), dir.path());
        resolver.install("httpx");
        resolver.install("polars");
        assert_eq!(resolver.search_path().len(), 1);
        assert_eq!(resolver.installed(), reqs(&["httpx", "polars"]));
        assert!(resolver.install_dir().is_dir());
    }

    #[test]
    fn test_failed_install_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(FakeInstaller::new(vec!["nonexistent-pkg-xyz"]), dir.path());
        let outcome = resolver.install("nonexistent-pkg-xyz");
        assert!(!outcome.success);
        assert!(outcome.message.contains("nonexistent-pkg-xyz"));
        assert!(resolver.installed().is_empty());
        assert!(resolver.search_path().is_empty());
    }

    #[test]
    fn test_setup_empty_requirements_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let installer = FakeInstaller::new(vec![]);
        let resolver = resolver_with(installer.clone(), dir.path());
        assert_eq!(resolver.setup_environment(&[]), EnvironmentSetup::Ready);
        assert_eq!(installer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_setup_skips_preinstalled_names() {
        let dir = tempfile::tempdir().unwrap();
        let installer = FakeInstaller::new(vec![]);
        let resolver = resolver_with(installer.clone(), dir.path());
        let setup = resolver.setup_environment(&reqs(&["numpy", "pandas"]));
        assert_eq!(setup, EnvironmentSetup::Ready);
        assert_eq!(installer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_setup_aggregates_failures_and_keeps_successes() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(FakeInstaller::new(vec!["bad-one", "bad-two"]), dir.path());
        let setup = resolver.setup_environment(&reqs(&["bad-one", "httpx", "numpy", "bad-two"]));

        let warnings = setup.warnings();
        let parts: Vec<&str> = warnings.split("; ").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("Failed to install bad-one: "));
        assert!(parts[1].starts_with("Failed to install bad-two: "));
        assert_eq!(resolver.installed(), reqs(&["httpx"]));
    }

    #[test]
    fn test_concurrent_installs_of_same_name_fetch_once() {
        let dir = tempfile::tempdir().unwrap();
        let installer = FakeInstaller::new(vec![]);
        let resolver = Arc::new(resolver_with(installer.clone(), dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = resolver.clone();
                std::thread::spawn(move || r.install("httpx").success)
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(installer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.search_path().len(), 1);
    }

    /// Blocks inside `install` until released.
    struct GatedInstaller {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl PackageInstaller for GatedInstaller {
        fn install(&self, _name: &str, _target: &Path) -> Result<(), InstallError> {
            let _ = self.started.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(())
        }
    }

    #[test]
    fn test_state_readable_while_install_runs() {
        let dir = tempfile::tempdir().unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let installer = Arc::new(GatedInstaller {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let resolver = Arc::new(DependencyResolver::new(
            LibraryRegistry::default(),
            installer,
            dir.path().join("pkgs"),
        ));

        let r = resolver.clone();
        let handle = std::thread::spawn(move || r.install("slow-pkg").success);
        started_rx.recv_timeout(Duration::from_secs(10)).unwrap();

        // Install is in flight; readers must not wait for it.
        let (done_tx, done_rx) = mpsc::channel();
        let r = resolver.clone();
        std::thread::spawn(move || {
            let _ = done_tx.send((r.search_path(), r.installed()));
        });
        let (search_path, installed) = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(search_path.is_empty());
        assert!(installed.is_empty());

        release_tx.send(()).unwrap();
        assert!(handle.join().unwrap());
        assert_eq!(resolver.installed(), reqs(&["slow-pkg"]));
    }

    #[test]
    fn test_bogus_interpreter_fails_install_naming_package() {
        let dir = tempfile::tempdir().unwrap();
        let installer = Arc::new(PipInstaller::new(
            &ResolvedRuntime::new("/definitely/not/python"),
            Duration::from_secs(2),
        ));
        let resolver =
            DependencyResolver::new(LibraryRegistry::default(), installer, dir.path().join("pkgs"));
        let setup = resolver.setup_environment(&reqs(&["nonexistent-pkg-xyz"]));
        assert!(setup.warnings().contains("nonexistent-pkg-xyz"));
        assert!(resolver.installed().is_empty());
    }
}
