//! Config structs grouped by concern, loaded from the environment.

use std::path::PathBuf;

use super::env_keys::{interpreter as interp_keys, observability as obv_keys};
use super::loader::{env_bool, env_list, env_optional, env_or, env_parse, load_dotenv};
use super::ConfigError;

/// Default deadline for one package install, in seconds.
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 30;

/// Name of the isolated install directory under the system temp dir.
pub const DEFAULT_PACKAGES_DIR_NAME: &str = "py_packages";

/// Interpreter, install location and policy settings.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Explicit interpreter executable; `None` means search PATH.
    pub python: Option<String>,
    /// Isolated directory that `install` targets.
    pub packages_dir: PathBuf,
    pub install_timeout_secs: u64,
    /// Names appended to the built-in preinstalled registry.
    pub extra_preinstalled: Vec<String>,
    /// Literal patterns appended to the built-in denylist.
    pub extra_blocked_patterns: Vec<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            python: None,
            packages_dir: std::env::temp_dir().join(DEFAULT_PACKAGES_DIR_NAME),
            install_timeout_secs: DEFAULT_INSTALL_TIMEOUT_SECS,
            extra_preinstalled: Vec::new(),
            extra_blocked_patterns: Vec::new(),
        }
    }
}

impl InterpreterConfig {
    /// Load from the environment (and `.env`). Unparsable or out-of-range
    /// numbers are fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        let defaults = Self::default();
        let config = Self {
            python: env_optional(interp_keys::PYINTERP_PYTHON),
            packages_dir: env_optional(interp_keys::PYINTERP_PACKAGES_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.packages_dir),
            install_timeout_secs: env_parse::<u64>(interp_keys::PYINTERP_INSTALL_TIMEOUT_SECS)?
                .unwrap_or(defaults.install_timeout_secs),
            extra_preinstalled: env_list(interp_keys::PYINTERP_PREINSTALLED),
            extra_blocked_patterns: env_list(interp_keys::PYINTERP_BLOCKED_PATTERNS),
        };
        config.validate()?;
        Ok(config)
    }

    /// A zero install deadline would fail every install on its first poll.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.install_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: interp_keys::PYINTERP_INSTALL_TIMEOUT_SECS.to_string(),
                value: self.install_timeout_secs.to_string(),
                reason: "install timeout must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    /// Apply CLI overrides on top of env values.
    pub fn with_overrides(
        mut self,
        python: Option<String>,
        packages_dir: Option<PathBuf>,
        install_timeout_secs: Option<u64>,
    ) -> Self {
        if python.is_some() {
            self.python = python;
        }
        if let Some(dir) = packages_dir {
            self.packages_dir = dir;
        }
        if let Some(secs) = install_timeout_secs {
            self.install_timeout_secs = secs;
        }
        self
    }
}

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::PYINTERP_QUIET, false),
                log_level: env_or(obv_keys::PYINTERP_LOG_LEVEL, || "pyinterp=info".to_string()),
                log_json: env_bool(obv_keys::PYINTERP_LOG_JSON, false),
                audit_log: env_optional(obv_keys::PYINTERP_AUDIT_LOG),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_env_values() {
        let cfg = InterpreterConfig::default().with_overrides(
            Some("/opt/py/bin/python3".to_string()),
            Some(PathBuf::from("/srv/pkgs")),
            Some(5),
        );
        assert_eq!(cfg.python.as_deref(), Some("/opt/py/bin/python3"));
        assert_eq!(cfg.packages_dir, PathBuf::from("/srv/pkgs"));
        assert_eq!(cfg.install_timeout_secs, 5);
    }

    #[test]
    fn test_zero_install_timeout_is_rejected() {
        let err = InterpreterConfig::default()
            .with_overrides(None, None, Some(0))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("PYINTERP_INSTALL_TIMEOUT_SECS"));
        assert!(InterpreterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_install_timeout_from_env_is_rejected() {
        std::env::set_var(interp_keys::PYINTERP_INSTALL_TIMEOUT_SECS, "0");
        let result = InterpreterConfig::from_env();
        std::env::remove_var(interp_keys::PYINTERP_INSTALL_TIMEOUT_SECS);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_absent_overrides_keep_defaults() {
        let cfg = InterpreterConfig::default().with_overrides(None, None, None);
        assert!(cfg.python.is_none());
        assert_eq!(cfg.install_timeout_secs, DEFAULT_INSTALL_TIMEOUT_SECS);
        assert!(cfg.packages_dir.ends_with(DEFAULT_PACKAGES_DIR_NAME));
    }
}
