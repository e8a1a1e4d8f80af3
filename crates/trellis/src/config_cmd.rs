// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `trellis config` command implementation.

use std::io::IsTerminal;
use std::process::ExitCode;

use trellis_config::{McpTransport, TrellisConfig};
use trellis_core::TrellisError;

/// Run `trellis config check`.
///
/// Loading already validated the configuration; this prints what was loaded.
pub fn run_check(config: &TrellisConfig, plain: bool) -> Result<ExitCode, TrellisError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let header = if use_color {
        use colored::Colorize;
        format!("{} configuration is valid", "✓".green())
    } else {
        "[OK] configuration is valid".to_string()
    };

    println!("{header}");
    for line in summary(config) {
        println!("  {line}");
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `trellis config show`.
pub fn run_show(config: &TrellisConfig) -> Result<ExitCode, TrellisError> {
    let rendered = toml::to_string_pretty(config).map_err(|e| TrellisError::Serialization {
        message: "rendering configuration as TOML".to_string(),
        source: Some(Box::new(e)),
    })?;
    print!("{rendered}");
    Ok(ExitCode::SUCCESS)
}

fn summary(config: &TrellisConfig) -> Vec<String> {
    let mut lines = vec![
        format!("agent          {} (max {} turns)", config.agent.name, config.agent.max_turns),
        format!("log level      {}", config.agent.log_level),
        format!(
            "state          {} as {}",
            config.state.directory, config.state.format
        ),
        format!(
            "tools          timeout {}s, strict state loading {}",
            config.tools.default_timeout_secs, config.tools.strict_state_loading
        ),
    ];
    if config.mcp.servers.is_empty() {
        lines.push("mcp servers    none".to_string());
    }
    for server in &config.mcp.servers {
        let target = match server.transport {
            McpTransport::Stdio => server.command.clone().unwrap_or_default(),
            McpTransport::Sse => server.url.clone().unwrap_or_default(),
        };
        let state = if server.enabled { "" } else { " (disabled)" };
        lines.push(format!("mcp server     {} -> {target}{state}", server.id));
    }
    lines
}
