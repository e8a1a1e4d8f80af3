// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trellis - capability registries and MCP servers from the command line.
//!
//! This is the binary entry point.

mod config_cmd;
mod tools_cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Trellis - capability registries and MCP servers from the command line.
#[derive(Parser, Debug)]
#[command(name = "trellis", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the standard search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Connect every configured MCP server and list its capabilities.
    Tools {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Dispatch one capability call and print the response envelope.
    Call {
        /// Registered capability name, including any server prefix.
        tool: String,

        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,

        /// Load saved registry state before the call.
        #[arg(long)]
        restore_state: bool,

        /// Save registry state after the call.
        #[arg(long)]
        save_state: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and summarize it.
    Check,
    /// Print the effective configuration as TOML.
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => trellis_config::load_and_validate_path(path),
        None => trellis_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            trellis_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Commands::Config {
            action: ConfigAction::Check,
        } => config_cmd::run_check(&config, cli.plain),
        Commands::Config {
            action: ConfigAction::Show,
        } => config_cmd::run_show(&config),
        Commands::Tools { json } => tools_cmd::run_tools(&config, json, cli.plain).await,
        Commands::Call {
            tool,
            args,
            restore_state,
            save_state,
        } => {
            let state = tools_cmd::StateOptions {
                restore: restore_state,
                save: save_state,
            };
            tools_cmd::run_call(&config, &tool, &args, state).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("trellis: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trellis={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn call_arguments_parse() {
        let cli = Cli::try_parse_from([
            "trellis",
            "--plain",
            "call",
            "srv_echo",
            "--args",
            r#"{"text":"hi"}"#,
            "--save-state",
        ])
        .unwrap();
        assert!(cli.plain);
        match cli.command {
            Commands::Call {
                tool,
                args,
                save_state,
                restore_state,
            } => {
                assert_eq!(tool, "srv_echo");
                assert_eq!(args, r#"{"text":"hi"}"#);
                assert!(save_state && !restore_state);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = trellis_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.agent.name, "trellis");
    }
}
