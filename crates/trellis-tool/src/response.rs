// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The structured envelope every tool call returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trellis_core::{TrellisError, ValidationDetails};

use crate::metadata::ToolCategory;

pub const DISABLED: &str = "capability disabled";
pub const VALIDATION_FAILED: &str = "validation failed";
pub const UNKNOWN_CAPABILITY: &str = "unknown capability";
pub const RATE_LIMITED: &str = "rate limit exceeded";

/// Per-call metadata attached to an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub tool: String,
    pub version: String,
    pub category: ToolCategory,
    /// `<tool>_<n>`, unique per tool instance.
    pub call_id: String,
    pub timestamp: DateTime<Utc>,
    pub execution_ms: f64,
}

/// Runtime counters of a tool at the time a call finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub call_count: u64,
    pub error_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_called: Option<DateTime<Utc>>,
}

/// Type and message of a failure raised by a tool body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Outcome of one call: `{success, result|error, metadata, status, details?, exception?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CallMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

impl ToolResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            metadata: None,
            status: None,
            details: None,
            exception: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            metadata: None,
            status: None,
            details: None,
            exception: None,
        }
    }

    pub fn invalid(details: ValidationDetails) -> Self {
        Self {
            details: Some(details),
            ..Self::failure(VALIDATION_FAILED)
        }
    }

    /// Failure carrying the error's message and type name.
    pub fn from_error(err: &TrellisError) -> Self {
        Self::raised(err.kind(), err.to_string())
    }

    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            exception: Some(ExceptionInfo {
                kind: kind.into(),
                message: message.clone(),
            }),
            ..Self::failure(message)
        }
    }

    /// Envelope returned by a registry for a name it does not know.
    pub fn unknown_capability(name: &str) -> Self {
        let err = TrellisError::UnknownCapability {
            name: name.to_string(),
        };
        Self {
            exception: Some(ExceptionInfo {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
            ..Self::failure(UNKNOWN_CAPABILITY)
        }
    }

    pub fn with_metadata(mut self, metadata: CallMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_status(mut self, status: StatusSnapshot) -> Self {
        self.status = Some(status);
        self
    }

    /// JSON form, as sent back to a model in a tool-role message.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": format!("unencodable response: {e}") })
        })
    }
}
