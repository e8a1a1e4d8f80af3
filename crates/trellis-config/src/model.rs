// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Trellis.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Trellis configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrellisConfig {
    /// Agent identity and tool-loop settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Defaults applied to local tools.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Where and how container state is persisted.
    #[serde(default)]
    pub state: StateConfig,

    /// Remote MCP servers whose tools are attached at startup.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Agent identity and tool-loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum model turns per request before the tool loop gives up.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Inline system prompt prepended to every conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            max_turns: default_max_turns(),
            system_prompt: None,
        }
    }
}

fn default_agent_name() -> String {
    "trellis".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_turns() -> usize {
    8
}

/// Defaults for local tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Execution timeout for tools that do not declare their own.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Reject unknown entries when restoring saved state.
    #[serde(default = "default_true")]
    pub strict_state_loading: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            strict_state_loading: true,
        }
    }
}

impl ToolsConfig {
    /// `default_timeout_secs` as a duration.
    pub fn default_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.default_timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// State persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Directory that holds saved state files.
    #[serde(default = "default_state_directory")]
    pub directory: String,

    /// Backend name: `auto`, `json`, `yaml`, or `binary`.
    #[serde(default = "default_state_format")]
    pub format: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            directory: default_state_directory(),
            format: default_state_format(),
        }
    }
}

fn default_state_directory() -> String {
    "state".to_string()
}

fn default_state_format() -> String {
    "json".to_string()
}

/// MCP client configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct McpConfig {
    /// Servers to connect to, in order.
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

/// Transport used to reach an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    /// Spawn a subprocess and speak over its stdin/stdout.
    Stdio,
    /// Connect to an HTTP server-sent-events endpoint.
    Sse,
}

/// One `[[mcp.servers]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct McpServerConfig {
    /// Unique server identifier.
    pub id: String,

    pub transport: McpTransport,

    /// Executable to spawn (stdio).
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides for the spawned process (stdio).
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory for the spawned process (stdio).
    #[serde(default)]
    pub cwd: Option<String>,

    /// Event-stream endpoint (sse).
    #[serde(default)]
    pub url: Option<String>,

    /// Extra HTTP headers (sse).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Prefix applied as `<prefix>_<tool>` when attaching tools.
    #[serde(default)]
    pub tool_prefix: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl McpServerConfig {
    /// A stdio server entry with defaults for everything else.
    pub fn stdio(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transport: McpTransport::Stdio,
            command: Some(command.into()),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            url: None,
            headers: BTreeMap::new(),
            tool_prefix: None,
            request_timeout_secs: default_timeout_secs(),
            enabled: true,
        }
    }

    /// An SSE server entry with defaults for everything else.
    pub fn sse(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            transport: McpTransport::Sse,
            command: None,
            url: Some(url.into()),
            ..Self::stdio(id, "")
        }
    }
}
