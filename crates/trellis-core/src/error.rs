// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Trellis runtime.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

/// Per-parameter validation failures, keyed by parameter name.
pub type ValidationDetails = BTreeMap<String, Vec<String>>;

/// The primary error type used across every Trellis crate.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// Supplied arguments do not satisfy a parameter contract.
    #[error("validation failed: {}", summarize(details))]
    Validation { details: ValidationDetails },

    /// A capability name was not found in the registry.
    #[error("unknown capability: {name}")]
    UnknownCapability { name: String },

    /// Strict state loading met a key that is not a declared field.
    #[error("unknown field `{field}` for {container}")]
    UnknownField { container: String, field: String },

    /// Strict state loading met a nested state with no registered child.
    #[error("unknown child `{child}` for {container}")]
    UnknownChild { container: String, child: String },

    /// A different capability is already registered under this name.
    #[error("duplicate name: {name}")]
    DuplicateName { name: String },

    /// A name was rejected at registration time.
    #[error("invalid name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },

    /// A remote request received no correlated reply in time.
    #[error("remote call `{method}` timed out after {duration:?}")]
    RemoteTimeout { method: String, duration: Duration },

    /// The remote peer misbehaved, closed the transport, or returned an error.
    #[error("remote protocol error: {message}")]
    RemoteProtocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Filesystem errors, propagated unchanged.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Text or bytes could not be decoded into the expected shape.
    #[error("deserialization error: {message}")]
    Deserialization {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A value could not be encoded by a persistence backend.
    #[error("serialization error: {message}")]
    Serialization {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A local operation did not finish within its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Failure raised by a capability body.
    #[error("{0}")]
    Execution(String),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TrellisError {
    /// Shorthand for a capability body failure.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Builds a deserialization error that keeps its cause.
    pub fn deserialization(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Deserialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a remote protocol error without an underlying cause.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::RemoteProtocol {
            message: message.into(),
            source: None,
        }
    }

    /// Stable type name reported in response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::UnknownCapability { .. } => "UnknownCapabilityError",
            Self::UnknownField { .. } => "UnknownFieldError",
            Self::UnknownChild { .. } => "UnknownChildError",
            Self::DuplicateName { .. } => "DuplicateNameError",
            Self::InvalidName { .. } => "InvalidNameError",
            Self::RemoteTimeout { .. } => "RemoteTimeoutError",
            Self::RemoteProtocol { .. } => "RemoteProtocolError",
            Self::Io(_) => "IOError",
            Self::Deserialization { .. } => "DeserializationError",
            Self::Serialization { .. } => "SerializationError",
            Self::Timeout { .. } => "Timeout",
            Self::Execution(_) => "ExecutionError",
            Self::Config(_) => "ConfigError",
            Self::Internal(_) => "InternalError",
        }
    }
}

fn summarize(details: &ValidationDetails) -> String {
    details
        .iter()
        .map(|(param, reasons)| format!("{param}: {}", reasons.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}
