//! pyinterp binary entry: CLI dispatch and the MCP stdio server.

mod cli;
pub mod commands;
pub mod mcp;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands, GlobalArgs};
use pyinterp_core::config::InterpreterConfig;
use pyinterp_core::observability;
use pyinterp_sandbox::PythonInterpreter;

/// Parse args and dispatch to the command handlers.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing();

    let config = load_config(&cli.global)?;
    match cli.command {
        Commands::Exec {
            code,
            file,
            requirements,
        } => {
            let interpreter = build_interpreter(&config)?;
            let snippet = commands::execute::read_snippet(code, file.as_deref(), std::io::stdin())?;
            let result = commands::execute::exec_snippet(&interpreter, snippet, requirements);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Env => {
            let interpreter = build_interpreter(&config)?;
            let info = commands::execute::environment_info(&interpreter);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Packages => {
            let packages = commands::execute::preinstalled_packages(&config);
            println!("{}", serde_json::to_string_pretty(&packages)?);
        }
        Commands::Mcp => {
            let interpreter = build_interpreter(&config)?;
            mcp::serve_mcp_stdio(interpreter)?;
        }
    }
    Ok(())
}

fn load_config(global: &GlobalArgs) -> Result<InterpreterConfig> {
    let config = InterpreterConfig::from_env()
        .context("Invalid PYINTERP_* configuration")?
        .with_overrides(
            global.python.clone(),
            global.packages_dir.clone(),
            global.install_timeout,
        );
    config.validate().context("Invalid configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn build_interpreter(config: &InterpreterConfig) -> Result<PythonInterpreter> {
    PythonInterpreter::from_config(config).context("No usable Python interpreter")
}
