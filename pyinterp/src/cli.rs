use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// pyinterp - run Python snippets with on-demand dependencies
#[derive(Parser, Debug)]
#[command(name = "pyinterp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for values otherwise taken from PYINTERP_* variables.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Python interpreter to run snippets and pip with (default: python3 or python on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub python: Option<String>,

    /// Directory that requirements are installed into
    #[arg(long, global = true, value_name = "DIR")]
    pub packages_dir: Option<PathBuf>,

    /// Deadline for a single package install, in seconds (default: from env or 30)
    #[arg(long, global = true, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub install_timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a snippet and print the result as JSON
    Exec {
        /// Code to run. Without --code or --file the snippet is read from stdin
        #[arg(long, short = 'c', conflicts_with = "file")]
        code: Option<String>,

        /// Read the snippet from a file
        #[arg(long, short = 'f', value_name = "PATH")]
        file: Option<PathBuf>,

        /// Library the snippet needs (repeatable)
        #[arg(long = "requirement", short = 'r', value_name = "PKG")]
        requirements: Vec<String>,
    },

    /// Show interpreter version, platform and install directory
    Env,

    /// List libraries treated as preinstalled
    Packages,

    /// Serve the interpreter tools over MCP (JSON-RPC 2.0 on stdio)
    Mcp,
}
