//! Unified configuration layer.
//!
//! Every environment variable read goes through this module; the rest of the
//! workspace only sees structured config values.
//!
//! - `loader`: `.env` loading plus the env_or / env_optional / env_bool / env_parse helpers
//! - `schema`: InterpreterConfig, ObservabilityConfig
//! - `env_keys`: variable name constants

pub mod env_keys;
pub mod loader;
pub mod schema;

use thiserror::Error;

pub use loader::{env_bool, env_list, env_optional, env_or, env_parse, load_dotenv};
pub use schema::{InterpreterConfig, ObservabilityConfig, DEFAULT_INSTALL_TIMEOUT_SECS};

/// Startup-time configuration faults. These are fatal for the host process,
/// never produced on a per-request path.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
