//! Environment variable keys. All of them use the `PYINTERP_*` prefix.

/// Interpreter, package directory and policy knobs
pub mod interpreter {
    pub const PYINTERP_PYTHON: &str = "PYINTERP_PYTHON";

    pub const PYINTERP_PACKAGES_DIR: &str = "PYINTERP_PACKAGES_DIR";

    /// Deadline for a single package install, in seconds.
    pub const PYINTERP_INSTALL_TIMEOUT_SECS: &str = "PYINTERP_INSTALL_TIMEOUT_SECS";

    /// Comma-separated names added to the preinstalled registry.
    pub const PYINTERP_PREINSTALLED: &str = "PYINTERP_PREINSTALLED";

    /// Comma-separated literal patterns appended to the execution denylist.
    pub const PYINTERP_BLOCKED_PATTERNS: &str = "PYINTERP_BLOCKED_PATTERNS";
}

/// Observability and logging
pub mod observability {
    pub const PYINTERP_QUIET: &str = "PYINTERP_QUIET";
    pub const PYINTERP_LOG_LEVEL: &str = "PYINTERP_LOG_LEVEL";
    pub const PYINTERP_LOG_JSON: &str = "PYINTERP_LOG_JSON";
    pub const PYINTERP_AUDIT_LOG: &str = "PYINTERP_AUDIT_LOG";
}
