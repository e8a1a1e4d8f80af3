// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Descriptive metadata attached to every tool.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use trellis_core::TrellisError;

/// Execution timeout for tools that declare none, unless a registry
/// supplies its own default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default semantic version for a tool.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Broad grouping used by the registry's category index.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Search,
    Calculation,
    Storage,
    Filesystem,
    Network,
    System,
    #[default]
    Utility,
    Generative,
    Custom,
}

/// Who may invoke a tool.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Public,
    Limited,
    Private,
    Admin,
}

/// Immutable description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Unique within one registry.
    pub name: String,
    pub description: String,
    /// Semantic version string.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub category: ToolCategory,
    #[serde(default)]
    pub access: AccessLevel,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Maximum calls per rolling minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    /// Declared execution timeout. `None` inherits the registry default.
    #[serde(
        rename = "timeout_secs",
        with = "duration_secs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: description.into(),
            version: DEFAULT_VERSION.to_string(),
            author: None,
            category: ToolCategory::default(),
            access: AccessLevel::default(),
            tags: Vec::new(),
            rate_limit: None,
            timeout: None,
            requires_auth: false,
            deprecated: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks the name charset and the version string.
    pub fn validate(&self) -> Result<(), TrellisError> {
        validate_tool_name(&self.name)?;
        semver::Version::parse(&self.version).map_err(|e| TrellisError::InvalidName {
            name: self.name.clone(),
            reason: format!("version `{}` is not semantic: {e}", self.version),
        })?;
        Ok(())
    }
}

/// Tool names must be non-empty and use `[A-Za-z0-9_.-]` only.
pub fn validate_tool_name(name: &str) -> Result<(), TrellisError> {
    if name.is_empty() {
        return Err(TrellisError::InvalidName {
            name: name.to_string(),
            reason: "tool name must not be empty".to_string(),
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(TrellisError::InvalidName {
            name: name.to_string(),
            reason: format!("character `{bad}` is not allowed in tool names"),
        });
    }
    Ok(())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
