//! Static knowledge of which libraries the host environment already provides.

use std::collections::BTreeSet;

/// Libraries assumed importable without an install step. Mixes third-party
/// distributions with standard-library modules that callers commonly list.
pub const DEFAULT_PREINSTALLED: &[&str] = &[
    "pandas",
    "numpy",
    "matplotlib",
    "scipy",
    "sklearn",
    "seaborn",
    "requests",
    "fastapi",
    "pydantic",
    "uvicorn",
    "json",
    "os",
    "re",
    "datetime",
    "math",
    "random",
    "collections",
];

/// Immutable set of preinstalled library names. Lookups are exact and
/// case-sensitive.
#[derive(Debug, Clone)]
pub struct LibraryRegistry {
    names: BTreeSet<String>,
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self {
            names: DEFAULT_PREINSTALLED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LibraryRegistry {
    /// Built-in defaults plus `extra` (blank names ignored).
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::default();
        for name in extra {
            let name = name.as_ref().trim();
            if !name.is_empty() {
                registry.names.insert(name.to_string());
            }
        }
        registry
    }

    pub fn is_preinstalled(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Sorted, duplicate-free listing.
    pub fn list_preinstalled(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
