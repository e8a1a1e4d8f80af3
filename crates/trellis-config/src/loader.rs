// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./trellis.toml` > `~/.config/trellis/trellis.toml` > `/etc/trellis/trellis.toml`
//! with environment variable overrides via `TRELLIS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TrellisConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG: &str = "/etc/trellis/trellis.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG: &str = "trellis.toml";

/// `~/.config/trellis/trellis.toml`, when a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trellis/trellis.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/trellis/trellis.toml` (system-wide)
/// 3. `~/.config/trellis/trellis.toml` (user XDG config)
/// 4. `./trellis.toml` (local directory)
/// 5. `TRELLIS_*` environment variables
pub fn load_config() -> Result<TrellisConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults.
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TrellisConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TrellisConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TrellisConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TrellisConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TrellisConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Maps `TRELLIS_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after the section is a separator, so
/// `TRELLIS_TOOLS_DEFAULT_TIMEOUT_SECS` becomes `tools.default_timeout_secs`.
/// MCP servers are arrays of tables and are only configurable from files.
fn env_provider() -> Env {
    Env::prefixed("TRELLIS_").map(|key| {
        let key_str = key.as_str();
        ["agent", "tools", "state"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TRELLIS_AGENT_MAX_TURNS", "3");
            jail.set_env("TRELLIS_TOOLS_DEFAULT_TIMEOUT_SECS", "5");
            jail.set_env("TRELLIS_STATE_FORMAT", "yaml");
            jail.create_file(LOCAL_CONFIG, "[agent]\nname = \"jailed\"\n")?;

            let config = load_config()?;
            assert_eq!(config.agent.name, "jailed");
            assert_eq!(config.agent.max_turns, 3);
            assert_eq!(config.tools.default_timeout_secs, 5);
            assert_eq!(config.state.format, "yaml");
            Ok(())
        });
    }
}
