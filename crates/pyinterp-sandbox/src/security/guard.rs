use thiserror::Error;

/// Built-in denylist, checked in this order.
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    "os.system",
    "subprocess.call",
    "subprocess.run",
    "subprocess.Popen",
    "__import__(\"os\")",
    "__import__(\"subprocess\")",
];

/// Code contained a denylisted pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Blocked dangerous operation: {pattern}")]
pub struct SecurityViolation {
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionGuard {
    patterns: Vec<String>,
}

impl Default for ExecutionGuard {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_BLOCKED_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExecutionGuard {
    /// Defaults followed by `extra`. Blank and duplicate patterns are skipped.
    pub fn with_extra_patterns<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = Self::default();
        for p in extra {
            let p = p.as_ref();
            if !p.trim().is_empty() && !guard.patterns.iter().any(|q| q == p) {
                guard.patterns.push(p.to_string());
            }
        }
        guard
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// First matching pattern in declaration order wins.
    pub fn check(&self, code: &str) -> Result<(), SecurityViolation> {
        match self.patterns.iter().find(|p| code.contains(p.as_str())) {
            Some(pattern) => Err(SecurityViolation {
                pattern: pattern.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_default_pattern_blocks() {
        let guard = ExecutionGuard::default();
        for pattern in DEFAULT_BLOCKED_PATTERNS {
            let code = format!("x = 1\n{}('ls')\n", pattern);
            let err = guard.check(&code).unwrap_err();
            assert_eq!(err.to_string(), format!("Blocked dangerous operation: {}", pattern));
        }
    }

    #[test]
    fn test_first_declared_pattern_wins() {
        let guard = ExecutionGuard::default();
        let err = guard
            .check("subprocess.run(['ls'])\nos.system('ls')")
            .unwrap_err();
        assert_eq!(err.pattern, "os.system");
    }

    #[test]
    fn test_match_is_literal_substring() {
        let guard = ExecutionGuard::default();
        // Matches inside comments and strings too.
        assert!(guard.check("# never call os.system here").is_err());
        assert!(guard.check("print('subprocess.Popen')").is_err());
        // Single-quoted import spelling is not in the list.
        assert!(guard.check("__import__('os')").is_ok());
        assert!(guard.check("import os\nprint(os.getcwd())").is_ok());
        assert!(guard.check("result = 2 + 2").is_ok());
    }

    #[test]
    fn test_extra_patterns_append_after_defaults() {
        let guard = ExecutionGuard::with_extra_patterns(["shutil.rmtree", "", "os.system"]);
        assert_eq!(guard.patterns().len(), DEFAULT_BLOCKED_PATTERNS.len() + 1);
        assert_eq!(guard.patterns().last().map(String::as_str), Some("shutil.rmtree"));
        let err = guard.check("import shutil; shutil.rmtree('/tmp/x')").unwrap_err();
        assert_eq!(err.pattern, "shutil.rmtree");
    }
}
