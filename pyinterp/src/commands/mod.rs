//! CLI command handlers. Each returns the payload the CLI prints; printing
//! and exit status stay in `run_cli`.

pub mod execute;
