// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tagged values that carry their semantic kind through serialization.
//!
//! A [`TypedValue`] pairs a [`ValueKind`] with the native Rust value for that
//! kind. Every kind has a JSON-ready form (see [`TypedValue::to_json`]) and
//! can be rebuilt from it given the kind as a hint. The only lossy kind is
//! [`ValueKind::Any`], which keeps whatever JSON it was given.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString};

use crate::error::TrellisError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// The semantic kind of a [`TypedValue`].
///
/// The snake_case name is the tag written into exported state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Tuple,
    Dict,
    Set,
    Bytes,
    Datetime,
    Date,
    Time,
    Decimal,
    Enum,
    None,
    Any,
}

/// JSON elements without repeats, in first-occurrence order.
///
/// Only constructible through [`ValueSet::new`], which drops duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Self(unique)
    }

    /// Adds `item` unless an equal element is present. Returns whether it was added.
    pub fn insert(&mut self, item: Value) -> bool {
        if self.0.contains(&item) {
            return false;
        }
        self.0.push(item);
        true
    }

    pub fn contains(&self, item: &Value) -> bool {
        self.0.contains(item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl IntoIterator for ValueSet {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One value of a known kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    /// Fixed-arity sequence; JSON has no tuple so it travels as an array.
    Tuple(Vec<Value>),
    Dict(Map<String, Value>),
    /// Unordered collection without duplicates; see [`ValueSet`].
    Set(ValueSet),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Decimal(Decimal),
    Enum { name: String, value: Value },
    None,
    Any(Value),
}

impl TypedValue {
    /// Wraps a JSON value using its runtime shape.
    ///
    /// Integers outside the `i64` range have no matching kind and wrap as
    /// [`ValueKind::Any`].
    pub fn infer(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if n.is_f64() {
                    Self::Float(n.as_f64().unwrap_or_default())
                } else {
                    Self::Any(Value::Number(n))
                }
            }
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items),
            Value::Object(map) => Self::Dict(map),
        }
    }

    /// Builds a set, dropping repeated elements.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Set(ValueSet::new(items))
    }

    /// Returns this value's kind tag.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Str(_) => ValueKind::String,
            Self::Int(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Boolean,
            Self::List(_) => ValueKind::List,
            Self::Tuple(_) => ValueKind::Tuple,
            Self::Dict(_) => ValueKind::Dict,
            Self::Set(_) => ValueKind::Set,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::DateTime(_) => ValueKind::Datetime,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Enum { .. } => ValueKind::Enum,
            Self::None => ValueKind::None,
            Self::Any(_) => ValueKind::Any,
        }
    }

    /// Converts to a JSON-ready value. Never fails.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(i) => json!(i),
            Self::Float(f) if f.is_finite() => json!(f),
            Self::Float(f) => Value::String(f.to_string()),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) | Self::Tuple(items) => Value::Array(items.clone()),
            Self::Set(set) => Value::Array(set.as_slice().to_vec()),
            Self::Dict(map) => Value::Object(map.clone()),
            Self::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
            Self::DateTime(dt) => Value::String(dt.to_rfc3339()),
            Self::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            Self::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
            Self::Decimal(d) => Value::String(d.to_string()),
            Self::Enum { name, value } => json!({ "name": name, "value": value }),
            Self::None => Value::Null,
            Self::Any(value) => value.clone(),
        }
    }

    /// Parses JSON text as a value of the given kind.
    pub fn from_json(kind: ValueKind, text: &str) -> Result<Self, TrellisError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| TrellisError::deserialization(format!("invalid {kind} JSON"), e))?;
        Self::from_json_value(kind, value)
    }

    /// Rebuilds a value of the given kind from its JSON-ready form.
    pub fn from_json_value(kind: ValueKind, value: Value) -> Result<Self, TrellisError> {
        let mismatch = |value: &Value| TrellisError::Deserialization {
            message: format!("expected {kind}, found {}", json_shape(value)),
            source: None,
        };

        let typed = match (kind, value) {
            (ValueKind::Any, v) => Self::Any(v),
            (ValueKind::None, Value::Null) => Self::None,
            (ValueKind::String, Value::String(s)) => Self::Str(s),
            (ValueKind::Boolean, Value::Bool(b)) => Self::Bool(b),
            (ValueKind::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Self::Int(f as i64)
                    }
                    _ => return Err(mismatch(&Value::Number(n))),
                },
            },
            (ValueKind::Float, Value::Number(n)) => {
                Self::Float(n.as_f64().ok_or_else(|| mismatch(&Value::Number(n.clone())))?)
            }
            (ValueKind::Float, Value::String(s)) => Self::Float(
                f64::from_str(&s)
                    .map_err(|e| TrellisError::deserialization(format!("invalid float `{s}`"), e))?,
            ),
            (ValueKind::List, Value::Array(items)) => Self::List(items),
            (ValueKind::Tuple, Value::Array(items)) => Self::Tuple(items),
            (ValueKind::Set, Value::Array(items)) => Self::set(items),
            (ValueKind::Dict, Value::Object(map)) => Self::Dict(map),
            (ValueKind::Bytes, Value::String(s)) => Self::Bytes(
                BASE64
                    .decode(s.as_bytes())
                    .map_err(|e| TrellisError::deserialization("invalid base64 bytes", e))?,
            ),
            (ValueKind::Bytes, Value::Array(items)) => {
                let mut bytes = Vec::with_capacity(items.len());
                for item in &items {
                    let byte = item
                        .as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| mismatch(item))?;
                    bytes.push(byte);
                }
                Self::Bytes(bytes)
            }
            (ValueKind::Datetime, Value::String(s)) => Self::DateTime(
                DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| TrellisError::deserialization(format!("invalid datetime `{s}`"), e))?
                    .with_timezone(&Utc),
            ),
            (ValueKind::Date, Value::String(s)) => Self::Date(
                NaiveDate::parse_from_str(&s, DATE_FORMAT)
                    .map_err(|e| TrellisError::deserialization(format!("invalid date `{s}`"), e))?,
            ),
            (ValueKind::Time, Value::String(s)) => Self::Time(
                NaiveTime::parse_from_str(&s, TIME_FORMAT)
                    .map_err(|e| TrellisError::deserialization(format!("invalid time `{s}`"), e))?,
            ),
            (ValueKind::Decimal, Value::String(s)) => Self::Decimal(
                Decimal::from_str(&s)
                    .map_err(|e| TrellisError::deserialization(format!("invalid decimal `{s}`"), e))?,
            ),
            (ValueKind::Decimal, Value::Number(n)) => Self::Decimal(
                Decimal::from_str(&n.to_string())
                    .map_err(|e| TrellisError::deserialization(format!("invalid decimal `{n}`"), e))?,
            ),
            (ValueKind::Enum, Value::Object(mut map)) => {
                let name = match map.remove("name") {
                    Some(Value::String(name)) => name,
                    _ => return Err(mismatch(&Value::Object(map))),
                };
                let value = map.remove("value").unwrap_or(Value::Null);
                Self::Enum { name, value }
            }
            (_, other) => return Err(mismatch(&other)),
        };
        Ok(typed)
    }

    /// Serializes the JSON-ready form to text.
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<Value> for TypedValue {
    fn from(value: Value) -> Self {
        Self::infer(value)
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for TypedValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => Self::Int(i),
            Err(_) => Self::Any(json!(value)),
        }
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Map<String, Value>> for TypedValue {
    fn from(value: Map<String, Value>) -> Self {
        Self::Dict(value)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDate> for TypedValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveTime> for TypedValue {
    fn from(value: NaiveTime) -> Self {
        Self::Time(value)
    }
}

impl From<Decimal> for TypedValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}
