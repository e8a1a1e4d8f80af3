// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as unique server ids, transport-specific required keys, and positive timeouts.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{McpTransport, TrellisConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const STATE_FORMATS: &[&str] = &["auto", "json", "yaml", "binary"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TrellisConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        fail(format!(
            "agent.log_level `{}` must be one of: {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.agent.max_turns == 0 {
        fail("agent.max_turns must be at least 1".to_string());
    }

    if config.tools.default_timeout_secs == 0 {
        fail("tools.default_timeout_secs must be positive".to_string());
    }

    if config.state.directory.trim().is_empty() {
        fail("state.directory must not be empty".to_string());
    }

    if !STATE_FORMATS.contains(&config.state.format.as_str()) {
        fail(format!(
            "state.format `{}` must be one of: {}",
            config.state.format,
            STATE_FORMATS.join(", ")
        ));
    }

    let mut seen_ids = HashSet::new();
    for (i, server) in config.mcp.servers.iter().enumerate() {
        if server.id.trim().is_empty() {
            fail(format!("mcp.servers[{i}].id must not be empty"));
        } else if !seen_ids.insert(server.id.as_str()) {
            fail(format!("duplicate server id `{}` in [[mcp.servers]]", server.id));
        }

        if server.request_timeout_secs == 0 {
            fail(format!(
                "mcp.servers[{i}].request_timeout_secs must be positive"
            ));
        }

        match server.transport {
            McpTransport::Stdio => {
                if server.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
                    fail(format!(
                        "mcp.servers[{i}] uses stdio transport but has no `command`"
                    ));
                }
            }
            McpTransport::Sse => match server.url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => fail(format!(
                    "mcp.servers[{i}].url `{url}` must start with http:// or https://"
                )),
                None => fail(format!(
                    "mcp.servers[{i}] uses sse transport but has no `url`"
                )),
            },
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
