// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Saving and loading container state through interchangeable backends.
//!
//! A saved file holds either the bare exported state or a document of the
//! form `{"metadata": {...}, "state": {...}}`. The metadata block records the
//! format version, the container type, a save timestamp, a SHA-256 checksum
//! of the canonical state JSON, and (for composites) the child names.
//! Checksum and type mismatches on load are logged, never fatal.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::error::TrellisError;
use crate::operator::{Operator, StateDict};

/// Version written into every metadata block.
pub const FORMAT_VERSION: &str = "1.0";

/// Leading bytes of a binary state file.
const BINARY_MAGIC: &[u8; 4] = b"TRLS";

/// Serialization backend for saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StateFormat {
    /// Pick by file extension, then (on load) by content.
    #[default]
    Auto,
    Json,
    Yaml,
    Binary,
}

impl StateFormat {
    /// Backend implied by a path's extension, if any.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "bin" | "trls" => Some(Self::Binary),
            _ => None,
        }
    }

    /// Backend implied by file content.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(BINARY_MAGIC) {
            return Self::Binary;
        }
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Metadata block attached to saved state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub format_version: String,
    pub container_type: String,
    pub saved_at: DateTime<Utc>,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_names: Option<Vec<String>>,
}

/// A parsed state file.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDocument {
    pub metadata: Option<StateMetadata>,
    pub state: StateDict,
}

impl StateDocument {
    /// Builds a document for a container's current state.
    pub fn capture<O: Operator + ?Sized>(container: &O, include_metadata: bool) -> Self {
        let state = container.export_state();
        let metadata = include_metadata.then(|| {
            let children = container.child_names();
            StateMetadata {
                format_version: FORMAT_VERSION.to_string(),
                container_type: container.type_name().to_string(),
                saved_at: Utc::now(),
                checksum: checksum(&state),
                child_names: container.children().map(|_| children),
            }
        });
        Self { metadata, state }
    }

    fn into_value(self) -> Result<Value, TrellisError> {
        match self.metadata {
            Some(metadata) => {
                let mut doc = Map::new();
                let metadata = serde_json::to_value(metadata).map_err(|e| TrellisError::Serialization {
                    message: "failed to encode state metadata".into(),
                    source: Some(Box::new(e)),
                })?;
                doc.insert("metadata".into(), metadata);
                doc.insert("state".into(), Value::Object(self.state));
                Ok(Value::Object(doc))
            }
            None => Ok(Value::Object(self.state)),
        }
    }

    fn from_value(value: Value) -> Result<Self, TrellisError> {
        let Value::Object(mut root) = value else {
            return Err(TrellisError::Deserialization {
                message: "state file root is not a mapping".into(),
                source: None,
            });
        };

        let is_document = root.len() == 2
            && root.get("metadata").is_some_and(|m| m.get("format_version").is_some())
            && root.get("state").is_some_and(Value::is_object);
        if !is_document {
            return Ok(Self {
                metadata: None,
                state: root,
            });
        }

        let metadata = root
            .remove("metadata")
            .map(serde_json::from_value::<StateMetadata>)
            .transpose()
            .map_err(|e| TrellisError::deserialization("invalid state metadata", e))?;
        let state = match root.remove("state") {
            Some(Value::Object(state)) => state,
            _ => StateDict::new(),
        };
        Ok(Self { metadata, state })
    }

    /// Encodes the document with a concrete backend.
    pub fn encode(self, format: StateFormat) -> Result<Vec<u8>, TrellisError> {
        let value = self.into_value()?;
        match format {
            StateFormat::Json | StateFormat::Auto => serde_json::to_vec_pretty(&value)
                .map_err(|e| TrellisError::Serialization {
                    message: "failed to encode state as JSON".into(),
                    source: Some(Box::new(e)),
                }),
            StateFormat::Yaml => serde_yml::to_string(&value)
                .map(String::into_bytes)
                .map_err(|e| TrellisError::Serialization {
                    message: "failed to encode state as YAML".into(),
                    source: Some(Box::new(e)),
                }),
            StateFormat::Binary => {
                let frame = BinaryFrame {
                    version: FORMAT_VERSION.to_string(),
                    payload: value.to_string(),
                };
                let body = bincode::serialize(&frame).map_err(|e| TrellisError::Serialization {
                    message: "failed to encode binary state".into(),
                    source: Some(Box::new(e)),
                })?;
                let mut bytes = BINARY_MAGIC.to_vec();
                bytes.extend(body);
                Ok(bytes)
            }
        }
    }

    /// Decodes bytes; `Auto` sniffs the content.
    pub fn decode(bytes: &[u8], format: StateFormat) -> Result<Self, TrellisError> {
        let format = match format {
            StateFormat::Auto => StateFormat::sniff(bytes),
            other => other,
        };
        let value: Value = match format {
            StateFormat::Json | StateFormat::Auto => serde_json::from_slice(bytes)
                .map_err(|e| TrellisError::deserialization("invalid JSON state file", e))?,
            StateFormat::Yaml => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| TrellisError::deserialization("YAML state file is not UTF-8", e))?;
                serde_yml::from_str(text)
                    .map_err(|e| TrellisError::deserialization("invalid YAML state file", e))?
            }
            StateFormat::Binary => {
                let body = bytes.strip_prefix(BINARY_MAGIC.as_slice()).ok_or_else(|| {
                    TrellisError::Deserialization {
                        message: "binary state file is missing its header".into(),
                        source: None,
                    }
                })?;
                let frame: BinaryFrame = bincode::deserialize(body).map_err(|e| {
                    TrellisError::Deserialization {
                        message: "invalid binary state frame".into(),
                        source: Some(Box::new(e)),
                    }
                })?;
                if frame.version != FORMAT_VERSION {
                    warn!(version = %frame.version, "binary state written by a different format version");
                }
                serde_json::from_str(&frame.payload)
                    .map_err(|e| TrellisError::deserialization("invalid binary state payload", e))?
            }
        };
        Self::from_value(value)
    }
}

#[derive(Serialize, Deserialize)]
struct BinaryFrame {
    version: String,
    payload: String,
}

/// SHA-256 hex digest of the state with object keys sorted.
pub fn checksum(state: &StateDict) -> String {
    let canonical = canonicalize(&Value::Object(state.clone()));
    hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// File persistence for every [`Operator`].
pub trait Persist: Operator {
    /// Writes the exported state to `path`, creating parent directories.
    ///
    /// I/O failures are returned unchanged as [`TrellisError::Io`].
    fn save(
        &self,
        path: &Path,
        format: StateFormat,
        include_metadata: bool,
    ) -> Result<(), TrellisError> {
        let format = match format {
            StateFormat::Auto => StateFormat::from_extension(path).unwrap_or(StateFormat::Json),
            other => other,
        };
        let bytes = StateDocument::capture(self, include_metadata).encode(format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        info!(path = %path.display(), format = %format, container = self.type_name(), "state saved");
        Ok(())
    }

    /// Reads `path` and restores it through [`Operator::load_state`].
    fn load(&mut self, path: &Path, format: StateFormat, strict: bool) -> Result<(), TrellisError> {
        let bytes = std::fs::read(path)?;
        let format = match format {
            StateFormat::Auto => StateFormat::from_extension(path)
                .unwrap_or_else(|| StateFormat::sniff(&bytes)),
            other => other,
        };
        let document = StateDocument::decode(&bytes, format)?;

        if let Some(metadata) = &document.metadata {
            if metadata.container_type != self.type_name() {
                warn!(
                    expected = self.type_name(),
                    found = %metadata.container_type,
                    "loading state saved by a different container type"
                );
            }
            if metadata.checksum != checksum(&document.state) {
                warn!(path = %path.display(), "state checksum mismatch");
            }
        }

        self.load_state(&document.state, strict)?;
        debug!(path = %path.display(), format = %format, "state loaded");
        Ok(())
    }
}

impl<T: Operator + ?Sized> Persist for T {}
