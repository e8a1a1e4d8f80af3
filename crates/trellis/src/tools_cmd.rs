// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `trellis tools` and `trellis call` command implementations.
//!
//! Both connect every enabled MCP server from `[[mcp.servers]]`, attach the
//! remote capabilities to a fresh registry, and shut the sessions down
//! before returning.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::{Value, json};
use tracing::{debug, info};
use trellis_config::TrellisConfig;
use trellis_core::{Persist, StateFormat, TrellisError};
use trellis_mcp_client::ServerManager;
use trellis_tool::ToolRegistry;

/// Registry state handling around `trellis call`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateOptions {
    pub restore: bool,
    pub save: bool,
}

/// Run `trellis tools`.
pub async fn run_tools(config: &TrellisConfig, json: bool, plain: bool) -> Result<ExitCode, TrellisError> {
    let registry = registry_for(config);
    let mut manager = ServerManager::connect_all(&config.mcp.servers, &registry).await;
    manager.shutdown_all().await;

    if json {
        let tools: Vec<Value> = registry
            .list()
            .into_iter()
            .map(|(name, description)| json!({"name": name, "description": description}))
            .collect();
        let failures: serde_json::Map<String, Value> = manager
            .failures()
            .iter()
            .map(|(id, e)| (id.clone(), json!(e.to_string())))
            .collect();
        println!("{:#}", json!({"tools": tools, "failures": failures}));
    } else {
        print_table(&registry, &manager, !plain && std::io::stdout().is_terminal());
    }

    Ok(if manager.failures().is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_table(registry: &ToolRegistry, manager: &ServerManager, use_color: bool) {
    let tools = registry.list();
    if tools.is_empty() {
        println!("no remote capabilities");
    }
    let width = tools.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, description) in &tools {
        println!("  {name:<width$}  {description}");
    }
    for (id, e) in manager.failures() {
        if use_color {
            use colored::Colorize;
            println!("{} {id}: {}", "✗".red(), e.to_string().red());
        } else {
            println!("[FAIL] {id}: {e}");
        }
    }
}

/// Run `trellis call`.
///
/// Prints the response envelope as JSON. The exit code reflects
/// `success`; envelope failures are output, not errors.
pub async fn run_call(
    config: &TrellisConfig,
    tool: &str,
    args: &str,
    state: StateOptions,
) -> Result<ExitCode, TrellisError> {
    let arguments: Value = serde_json::from_str(args)
        .map_err(|e| TrellisError::deserialization("--args is not valid JSON", e))?;

    let mut registry = registry_for(config);
    let mut manager = ServerManager::connect_all(&config.mcp.servers, &registry).await;
    let (path, format) = state_file(config)?;

    let outcome = async {
        if state.restore && path.exists() {
            registry.load(&path, format, config.tools.strict_state_loading)?;
            debug!(path = %path.display(), "registry state restored");
        }
        let response = registry.call(tool, arguments).await;
        if state.save {
            registry.save(&path, format, true)?;
            info!(path = %path.display(), "registry state saved");
        }
        Ok::<_, TrellisError>(response)
    }
    .await;
    manager.shutdown_all().await;

    let response = outcome?;
    println!("{:#}", response.to_json());
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Empty registry carrying the `[tools]` defaults.
fn registry_for(config: &TrellisConfig) -> ToolRegistry {
    ToolRegistry::new().with_default_timeout(config.tools.default_timeout())
}

/// Where `[state]` puts the registry's saved state.
fn state_file(config: &TrellisConfig) -> Result<(PathBuf, StateFormat), TrellisError> {
    let format: StateFormat = config.state.format.parse().map_err(|_| {
        TrellisError::Config(format!("unknown state format `{}`", config.state.format))
    })?;
    let extension = match format {
        StateFormat::Yaml => "yaml",
        StateFormat::Binary => "bin",
        StateFormat::Json | StateFormat::Auto => "json",
    };
    let path = PathBuf::from(&config.state.directory).join(format!("registry.{extension}"));
    Ok((path, format))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use trellis_tool::{Capability, LocalTool, ToolArgs};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn configured_timeout_reaches_undeclared_tools() {
        let config = trellis_config::load_and_validate_str("[tools]\ndefault_timeout_secs = 2\n").unwrap();
        let registry = registry_for(&config);
        let nap = LocalTool::builder("nap")
            .handler(|_: ToolArgs| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, TrellisError>(Value::Null)
            })
            .build()
            .unwrap();
        registry.register(Arc::new(nap)).unwrap();

        let resp = registry.call("nap", json!({})).await;
        assert_eq!(resp.exception.unwrap().kind, "Timeout");
        assert_eq!(registry.get("nap").unwrap().get_schema()["metadata"]["timeout_secs"], 2.0);
    }

    #[test]
    fn state_file_follows_configured_format() {
        let mut config = TrellisConfig::default();
        config.state.directory = "/tmp/trellis-state".into();
        config.state.format = "yaml".into();
        let (path, format) = state_file(&config).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/trellis-state/registry.yaml"));
        assert_eq!(format, StateFormat::Yaml);

        config.state.format = "xml".into();
        assert!(matches!(state_file(&config), Err(TrellisError::Config(_))));
    }
}
