// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parameter contracts and argument validation.
//!
//! Validation never stops at the first problem: every parameter is checked
//! and all reasons are collected per parameter name. Argument names the
//! contract does not declare are reported under [`UNKNOWN_ARGUMENTS`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString};
use trellis_core::{ValidationDetails, ValueKind};

/// Details key for argument names that no parameter declares.
pub const UNKNOWN_ARGUMENTS: &str = "_unknown";

/// JSON-schema type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
    /// No type constraint.
    Any,
}

impl ParamKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }

    /// Whether a JSON value has this kind. Integral floats count as integers.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Null => value.is_null(),
            Self::Any => true,
        }
    }

    /// Parameter kind for a state value kind.
    pub fn from_value_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::String
            | ValueKind::Bytes
            | ValueKind::Datetime
            | ValueKind::Date
            | ValueKind::Time
            | ValueKind::Decimal => Self::String,
            ValueKind::Integer => Self::Integer,
            ValueKind::Float => Self::Number,
            ValueKind::Boolean => Self::Boolean,
            ValueKind::List | ValueKind::Tuple | ValueKind::Set => Self::Array,
            ValueKind::Dict | ValueKind::Enum => Self::Object,
            ValueKind::None => Self::Null,
            ValueKind::Any => Self::Any,
        }
    }

    /// Kind named by a JSON-schema `type` (first non-null entry of a list).
    pub fn from_schema_type(schema_type: Option<&Value>) -> Self {
        let name = match schema_type {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null"),
            _ => None,
        };
        name.and_then(|n| n.parse().ok()).unwrap_or(Self::Any)
    }
}

fn describe_json(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Regular expression that must match at the start of string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

fn default_required() -> bool {
    true
}

impl ToolParameter {
    /// A required parameter with no constraints.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            required: true,
            default: None,
            allowed: None,
            minimum: None,
            maximum: None,
            pattern: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the parameter optional; absent means absent.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Marks the parameter optional and filled with `value` when absent.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// The `properties` entry for this parameter in a calling schema.
    ///
    /// Bounds are emitted for numeric kinds only, the pattern for strings only.
    pub fn schema_property(&self) -> Value {
        let mut prop = Map::new();
        if self.kind != ParamKind::Any {
            prop.insert("type".into(), json!(self.kind.to_string()));
        }
        prop.insert("description".into(), json!(self.description));
        if let Some(allowed) = &self.allowed {
            prop.insert("enum".into(), json!(allowed));
        }
        if self.kind.is_numeric() {
            if let Some(min) = self.minimum {
                prop.insert("minimum".into(), json!(min));
            }
            if let Some(max) = self.maximum {
                prop.insert("maximum".into(), json!(max));
            }
        }
        if self.kind == ParamKind::String
            && let Some(pattern) = &self.pattern
        {
            prop.insert("pattern".into(), json!(pattern));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        Value::Object(prop)
    }

    /// Every reason `value` violates this parameter. Empty means valid.
    pub fn check(&self, value: &Value) -> Vec<String> {
        if !self.kind.matches(value) {
            return vec![format!(
                "expected {}, found {}",
                self.kind,
                describe_json(value)
            )];
        }

        let mut reasons = Vec::new();
        if let Some(allowed) = &self.allowed
            && !allowed.contains(value)
        {
            let options = allowed
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            reasons.push(format!("must be one of [{options}]"));
        }
        if let Some(number) = value.as_f64() {
            if let Some(min) = self.minimum
                && number < min
            {
                reasons.push(format!("must be >= {min}"));
            }
            if let Some(max) = self.maximum
                && number > max
            {
                reasons.push(format!("must be <= {max}"));
            }
        }
        if let (Some(pattern), Some(text)) = (&self.pattern, value.as_str()) {
            match Regex::new(&format!("^(?:{pattern})")) {
                Ok(re) if re.is_match(text) => {}
                Ok(_) => reasons.push(format!("must match pattern `{pattern}`")),
                Err(_) => reasons.push(format!("invalid pattern `{pattern}`")),
            }
        }
        reasons
    }
}

/// Validates `args` against `params` and returns default-filled arguments.
///
/// A `null` argument counts as absent. On failure the details map holds
/// every offending parameter name with all of its reasons.
pub fn validate_arguments(
    params: &[ToolParameter],
    args: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationDetails> {
    let mut details = ValidationDetails::new();
    let mut filled = Map::new();

    for param in params {
        match args.get(&param.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let reasons = param.check(value);
                if reasons.is_empty() {
                    filled.insert(param.name.clone(), value.clone());
                } else {
                    details.insert(param.name.clone(), reasons);
                }
            }
            None if param.required => {
                details.insert(param.name.clone(), vec!["required".to_string()]);
            }
            None => {
                if let Some(default) = &param.default {
                    filled.insert(param.name.clone(), default.clone());
                }
            }
        }
    }

    let unknown: Vec<String> = args
        .keys()
        .filter(|key| !params.iter().any(|p| &p.name == *key))
        .map(|key| format!("unexpected argument `{key}`"))
        .collect();
    if !unknown.is_empty() {
        details.insert(UNKNOWN_ARGUMENTS.to_string(), unknown);
    }

    if details.is_empty() {
        Ok(filled)
    } else {
        Err(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn search_params() -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("query", ParamKind::String).pattern("[a-z]"),
            ToolParameter::new("limit", ParamKind::Integer)
                .with_default(10)
                .min(1.0)
                .max(50.0),
            ToolParameter::new("order", ParamKind::String)
                .optional()
                .one_of(["asc", "desc"]),
        ]
    }

    #[test]
    fn missing_required_parameter() {
        let details = validate_arguments(&search_params(), &Map::new()).unwrap_err();
        assert_eq!(details["query"], vec!["required"]);
        assert_eq!(details.len(), 1);
    }

    #[test]
    fn defaults_are_filled_and_optional_absent_stays_absent() {
        let filled = validate_arguments(&search_params(), &args(json!({"query": "rust"}))).unwrap();
        assert_eq!(filled["limit"], 10);
        assert!(!filled.contains_key("order"));
    }

    #[test]
    fn every_violation_is_collected() {
        let details = validate_arguments(
            &search_params(),
            &args(json!({"query": "RUST", "limit": 99, "order": "random", "page": 2})),
        )
        .unwrap_err();
        assert_eq!(details["query"], vec!["must match pattern `[a-z]`"]);
        assert_eq!(details["limit"], vec!["must be <= 50"]);
        assert_eq!(details["order"], vec![r#"must be one of ["asc", "desc"]"#]);
        assert_eq!(details[UNKNOWN_ARGUMENTS], vec!["unexpected argument `page`"]);
    }

    #[test]
    fn kind_mismatch_skips_other_checks() {
        let details =
            validate_arguments(&search_params(), &args(json!({"query": "q", "limit": "5"})))
                .unwrap_err();
        assert_eq!(details["limit"], vec!["expected integer, found string"]);
    }

    #[test]
    fn null_counts_as_absent() {
        let filled = validate_arguments(
            &search_params(),
            &args(json!({"query": "q", "limit": null})),
        )
        .unwrap();
        assert_eq!(filled["limit"], 10);
    }

    #[test]
    fn integral_float_is_an_integer() {
        assert!(ParamKind::Integer.matches(&json!(3.0)));
        assert!(!ParamKind::Integer.matches(&json!(3.5)));
        assert!(ParamKind::Number.matches(&json!(3)));
    }

    #[test]
    fn pattern_is_anchored_at_start_only() {
        let p = ToolParameter::new("code", ParamKind::String).pattern("[A-Z]{2}");
        assert!(p.check(&json!("GBP-1")).is_empty());
        assert!(!p.check(&json!("x-GB")).is_empty());
    }

    #[test]
    fn schema_property_respects_kind() {
        let text = ToolParameter::new("q", ParamKind::String)
            .describe("query")
            .pattern("^a")
            .min(1.0);
        assert_eq!(
            text.schema_property(),
            json!({"type": "string", "description": "query", "pattern": "^a"})
        );
        let num = ToolParameter::new("n", ParamKind::Number).min(0.0).pattern("x");
        assert_eq!(
            num.schema_property(),
            json!({"type": "number", "description": "", "minimum": 0.0})
        );
    }

    #[test]
    fn schema_type_lists_skip_null() {
        assert_eq!(
            ParamKind::from_schema_type(Some(&json!(["null", "integer"]))),
            ParamKind::Integer
        );
        assert_eq!(ParamKind::from_schema_type(None), ParamKind::Any);
    }
}
