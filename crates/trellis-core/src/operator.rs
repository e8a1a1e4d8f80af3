// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State containers ("operators") and their composition into trees.
//!
//! A container declares its fields once, as a static [`FieldSpec`] table,
//! and exposes them through [`Operator::field`] / [`Operator::set_field`].
//! Everything else (exporting, strict loading, recursion into children) is
//! provided by the trait's default methods.
//!
//! Exported state is a flat JSON object. Own fields appear as
//! `{"type": <kind tag>, "value": <json>}` entries; each child appears under
//! its registered name holding that child's own exported object.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::TrellisError;
use crate::module::Children;
use crate::value::{TypedValue, ValueKind};

/// Exported state of a container: name to entry, in declaration order.
pub type StateDict = Map<String, Value>;

/// One statically declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: ValueKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self { name, kind }
    }
}

/// A container of typed, serializable fields that may own named children.
///
/// Implementations are not internally synchronized; callers sharing one
/// tree across threads serialize access themselves.
pub trait Operator: Send + Sync {
    /// Type name recorded in saved metadata.
    fn type_name(&self) -> &str;

    /// The declared fields. Must not change over the container's lifetime.
    fn fields(&self) -> &'static [FieldSpec];

    /// Current value of a declared field.
    fn field(&self, name: &str) -> Option<TypedValue>;

    /// Assigns a declared field.
    fn set_field(&mut self, name: &str, value: TypedValue) -> Result<(), TrellisError>;

    /// Child containers, for composite types.
    fn children(&self) -> Option<&Children> {
        None
    }

    fn children_mut(&mut self) -> Option<&mut Children> {
        None
    }

    /// Registers (or replaces) a named child.
    fn add_child(&mut self, name: &str, child: Box<dyn Operator>) -> Result<(), TrellisError> {
        if name.trim().is_empty() {
            return Err(TrellisError::InvalidName {
                name: name.to_string(),
                reason: "child name must not be empty".to_string(),
            });
        }
        if self.fields().iter().any(|f| f.name == name) {
            return Err(TrellisError::InvalidName {
                name: name.to_string(),
                reason: "collides with a declared field".to_string(),
            });
        }
        let container = self.type_name().to_string();
        let Some(children) = self.children_mut() else {
            return Err(TrellisError::InvalidName {
                name: name.to_string(),
                reason: format!("{container} does not accept children"),
            });
        };
        if children.insert(name, child).is_some() {
            debug!(container = %container, child = name, "replaced child container");
        }
        Ok(())
    }

    fn child(&self, name: &str) -> Option<&dyn Operator> {
        self.children()?.get(name)
    }

    fn child_names(&self) -> Vec<String> {
        self.children().map(Children::names).unwrap_or_default()
    }

    /// Exports own fields, then each child's state under its name.
    fn export_state(&self) -> StateDict {
        let mut state = StateDict::new();
        for spec in self.fields() {
            if let Some(value) = self.field(spec.name) {
                state.insert(spec.name.to_string(), field_entry(&value));
            }
        }
        if let Some(children) = self.children() {
            for (name, child) in children.iter() {
                state.insert(name.to_string(), Value::Object(child.export_state()));
            }
        }
        state
    }

    /// Restores own fields, then recurses into registered children.
    ///
    /// With `strict`, an unknown plain entry fails with
    /// [`TrellisError::UnknownField`] and an unknown nested state fails with
    /// [`TrellisError::UnknownChild`]; the flag is forwarded to children.
    /// Own fields are validated before any of them is assigned. Fields
    /// missing from `state` keep their current values.
    fn load_state(&mut self, state: &StateDict, strict: bool) -> Result<(), TrellisError> {
        let container = self.type_name().to_string();
        let specs = self.fields();
        let child_names = self.child_names();

        let mut assignments = Vec::new();
        for (key, entry) in state {
            if let Some(spec) = specs.iter().find(|s| s.name == key) {
                assignments.push((spec.name, decode_field(&container, spec, entry)?));
            } else if child_names.iter().any(|n| n == key) {
                continue;
            } else if strict {
                return Err(unknown_entry(&container, key, entry));
            } else {
                debug!(container = %container, key = %key, "ignoring unknown state entry");
            }
        }

        for (name, value) in assignments {
            self.set_field(name, value)?;
        }

        if let Some(children) = self.children_mut() {
            for (name, child) in children.iter_mut() {
                match state.get(name) {
                    Some(Value::Object(child_state)) => child.load_state(child_state, strict)?,
                    Some(_) => {
                        return Err(TrellisError::Deserialization {
                            message: format!("state for child `{name}` of {container} is not an object"),
                            source: None,
                        });
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Every field of this container and its descendants, with dotted paths.
    fn named_parameters(&self) -> Vec<(String, TypedValue)> {
        let mut out: Vec<(String, TypedValue)> = self
            .fields()
            .iter()
            .filter_map(|spec| self.field(spec.name).map(|v| (spec.name.to_string(), v)))
            .collect();
        if let Some(children) = self.children() {
            for (prefix, child) in children.iter() {
                out.extend(
                    child
                        .named_parameters()
                        .into_iter()
                        .map(|(name, value)| (format!("{prefix}.{name}"), value)),
                );
            }
        }
        out
    }

    /// One-line summary such as `Counter(count=3, label="x") [child]`.
    fn describe(&self) -> String {
        let fields = self
            .fields()
            .iter()
            .filter_map(|spec| {
                self.field(spec.name)
                    .map(|v| format!("{}={}", spec.name, v.to_json_string()))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let children = self.child_names();
        if children.is_empty() {
            format!("{}({fields})", self.type_name())
        } else {
            format!("{}({fields}) [{}]", self.type_name(), children.join(", "))
        }
    }
}

/// Exported form of one field.
pub fn field_entry(value: &TypedValue) -> Value {
    json!({ "type": value.kind().to_string(), "value": value.to_json() })
}

/// Splits a `{"type", "value"}` entry into its tag and raw value.
///
/// Returns `None` for anything else, including objects with extra keys.
pub fn split_field_entry(entry: &Value) -> Option<(ValueKind, &Value)> {
    let map = entry.as_object()?;
    if map.len() != 2 {
        return None;
    }
    let kind = map.get("type")?.as_str()?.parse::<ValueKind>().ok()?;
    Some((kind, map.get("value")?))
}

/// Error for a field assignment with a value of the wrong kind.
pub fn field_mismatch(
    container: &str,
    field: &str,
    expected: ValueKind,
    found: &TypedValue,
) -> TrellisError {
    TrellisError::Deserialization {
        message: format!(
            "field `{field}` of {container} expects {expected}, found {}",
            found.kind()
        ),
        source: None,
    }
}

/// Error for `set_field` on a name the container does not declare.
pub fn unknown_field(container: &str, field: &str) -> TrellisError {
    TrellisError::UnknownField {
        container: container.to_string(),
        field: field.to_string(),
    }
}

/// Converts an incoming entry to the declared kind, using its tag as a hint.
fn decode_field(
    container: &str,
    spec: &FieldSpec,
    entry: &Value,
) -> Result<TypedValue, TrellisError> {
    let decoded = match split_field_entry(entry) {
        Some((ValueKind::None, _)) => Ok(TypedValue::None),
        Some((tag, raw)) if tag == spec.kind || spec.kind == ValueKind::Any => {
            TypedValue::from_json_value(tag, raw.clone())
        }
        Some((_, raw)) => TypedValue::from_json_value(spec.kind, raw.clone()),
        None => TypedValue::from_json_value(spec.kind, entry.clone()),
    };
    decoded.map_err(|e| TrellisError::Deserialization {
        message: format!("field `{}` of {container}: {e}", spec.name),
        source: Some(Box::new(e)),
    })
}

fn unknown_entry(container: &str, key: &str, entry: &Value) -> TrellisError {
    if entry.is_object() && split_field_entry(entry).is_none() {
        TrellisError::UnknownChild {
            container: container.to_string(),
            child: key.to_string(),
        }
    } else {
        unknown_field(container, key)
    }
}
