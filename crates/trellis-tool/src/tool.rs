// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability contract and its invocation pipeline.
//!
//! Every tool, local or remote, implements [`Capability`]. Implementors
//! supply a [`ToolCore`] (metadata, parameter contract, runtime counters)
//! and an `execute` body; the provided [`Capability::call`] wraps that body
//! in the full pipeline:
//!
//! 1. disabled tools answer `capability disabled` without counting;
//! 2. arguments are validated, collecting every problem;
//! 3. rate-limited calls answer `rate limit exceeded` without counting;
//!    only calls that passed validation use up the budget;
//! 4. the body runs under the tool's timeout with panics caught;
//! 5. success bumps `call_count`, any failure bumps `error_count`.
//!
//! Nothing raised by a body escapes `call`: every outcome is a
//! [`ToolResponse`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use trellis_core::operator::{field_mismatch, split_field_entry, unknown_field};
use trellis_core::{FieldSpec, Operator, StateDict, TrellisError, TypedValue, ValueKind};

use crate::metadata::{DEFAULT_TIMEOUT, ToolMetadata};
use crate::parameter::{ToolParameter, validate_arguments};
use crate::rate_limit::RateLimiter;
use crate::response::{
    CallMetadata, DISABLED, RATE_LIMITED, StatusSnapshot, ToolResponse, VALIDATION_FAILED,
};

/// Details key used when the arguments are not a JSON object.
pub const ARGUMENTS_KEY: &str = "_arguments";

const NEVER: i64 = i64::MIN;

/// Runtime counters of one tool. Shared across concurrent calls.
#[derive(Debug)]
pub struct ToolStatus {
    enabled: AtomicBool,
    call_count: AtomicU64,
    error_count: AtomicU64,
    last_called_us: AtomicI64,
    call_seq: AtomicU64,
}

impl Default for ToolStatus {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            call_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            last_called_us: AtomicI64::new(NEVER),
            call_seq: AtomicU64::new(0),
        }
    }
}

impl ToolStatus {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns whether the flag changed.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel) != enabled
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Acquire)
    }

    pub fn last_called(&self) -> Option<DateTime<Utc>> {
        match self.last_called_us.load(Ordering::Acquire) {
            NEVER => None,
            micros => DateTime::from_timestamp_micros(micros),
        }
    }

    fn set_last_called(&self, at: Option<DateTime<Utc>>) {
        let micros = at.map_or(NEVER, |t| t.timestamp_micros());
        self.last_called_us.store(micros, Ordering::Release);
    }

    fn record_success(&self) {
        self.call_count.fetch_add(1, Ordering::AcqRel);
        self.set_last_called(Some(Utc::now()));
    }

    fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::AcqRel);
    }

    fn next_call_id(&self, tool: &str) -> String {
        let n = self.call_seq.fetch_add(1, Ordering::AcqRel) + 1;
        format!("{tool}_{n}")
    }

    /// Clears counters. The enabled flag is left as is.
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::Release);
        self.error_count.store(0, Ordering::Release);
        self.set_last_called(None);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            enabled: self.is_enabled(),
            call_count: self.call_count(),
            error_count: self.error_count(),
            last_called: self.last_called(),
        }
    }
}

static TOOL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("metadata", ValueKind::Dict),
    FieldSpec::new("parameters", ValueKind::List),
    FieldSpec::new("config", ValueKind::Dict),
    FieldSpec::new("enabled", ValueKind::Boolean),
    FieldSpec::new("call_count", ValueKind::Integer),
    FieldSpec::new("error_count", ValueKind::Integer),
    FieldSpec::new("last_called", ValueKind::Datetime),
];

/// Descriptive and runtime state shared by every tool implementation.
#[derive(Debug)]
pub struct ToolCore {
    type_name: &'static str,
    metadata: ToolMetadata,
    parameters: Vec<ToolParameter>,
    config: RwLock<Map<String, Value>>,
    status: ToolStatus,
    limiter: Option<RateLimiter>,
    /// Milliseconds; applies when the metadata declares no timeout.
    default_timeout_ms: AtomicU64,
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ToolCore {
    pub fn new(metadata: ToolMetadata, parameters: Vec<ToolParameter>) -> Self {
        let limiter = metadata.rate_limit.map(RateLimiter::new);
        Self {
            type_name: "Tool",
            metadata,
            parameters,
            config: RwLock::new(Map::new()),
            status: ToolStatus::default(),
            limiter,
            default_timeout_ms: AtomicU64::new(duration_ms(DEFAULT_TIMEOUT)),
        }
    }

    /// Type name recorded when this tool's state is saved.
    pub fn with_type_name(mut self, type_name: &'static str) -> Self {
        self.type_name = type_name;
        self
    }

    pub fn with_config(self, config: Map<String, Value>) -> Self {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        self
    }

    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    pub fn status(&self) -> &ToolStatus {
        &self.status
    }

    /// Timeout the pipeline enforces: the declared one, else the default.
    /// Zero means no deadline.
    pub fn timeout(&self) -> Duration {
        self.metadata.timeout.unwrap_or_else(|| {
            Duration::from_millis(self.default_timeout_ms.load(Ordering::Acquire))
        })
    }

    /// Sets the timeout used when the metadata declares none.
    pub fn set_default_timeout(&self, timeout: Duration) {
        self.default_timeout_ms.store(duration_ms(timeout), Ordering::Release);
    }

    pub fn config(&self) -> Map<String, Value> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merges `updates` into the free-form configuration.
    pub fn update_config(&self, updates: Map<String, Value>) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.extend(updates);
    }

    /// Function-calling descriptor: `{name, description, parameters}`.
    pub fn calling_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.schema_property()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "name": self.metadata.name,
            "description": self.metadata.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
        })
    }

    /// Everything known about the tool in one document.
    pub fn full_schema(&self) -> Value {
        let mut metadata = serde_json::to_value(&self.metadata).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut metadata {
            map.insert("timeout_secs".to_string(), json!(self.timeout().as_secs_f64()));
        }
        json!({
            "metadata": metadata,
            "parameters": serde_json::to_value(&self.parameters).unwrap_or(Value::Null),
            "config": self.config(),
            "calling_schema": self.calling_schema(),
            "status": serde_json::to_value(self.status.snapshot()).unwrap_or(Value::Null),
        })
    }

    /// Restores the runtime entries (`enabled`, counters, `last_called`,
    /// `config`) of an exported tool state through a shared reference.
    ///
    /// Descriptive entries are left untouched; they belong to the live tool.
    pub fn restore_runtime(&self, state: &StateDict) -> Result<(), TrellisError> {
        let name = &self.metadata.name;
        if let Some(enabled) = raw_entry(state, "enabled") {
            let enabled = enabled
                .as_bool()
                .ok_or_else(|| runtime_mismatch(name, "enabled", "boolean"))?;
            self.status.set_enabled(enabled);
        }
        for (key, counter) in [
            ("call_count", &self.status.call_count),
            ("error_count", &self.status.error_count),
        ] {
            if let Some(value) = raw_entry(state, key) {
                let count = value
                    .as_u64()
                    .ok_or_else(|| runtime_mismatch(name, key, "unsigned integer"))?;
                counter.store(count, Ordering::Release);
            }
        }
        if let Some(value) = raw_entry(state, "last_called") {
            let at = if value.is_null() {
                None
            } else {
                Some(
                    serde_json::from_value::<DateTime<Utc>>(value.clone())
                        .map_err(|e| TrellisError::deserialization(format!("last_called of {name}"), e))?,
                )
            };
            self.status.set_last_called(at);
        }
        if let Some(Value::Object(config)) = raw_entry(state, "config") {
            *self.config.write().unwrap_or_else(PoisonError::into_inner) = config.clone();
        }
        Ok(())
    }

    fn call_metadata(&self, call_id: String, started: Instant) -> CallMetadata {
        CallMetadata {
            tool: self.metadata.name.clone(),
            version: self.metadata.version.clone(),
            category: self.metadata.category,
            call_id,
            timestamp: Utc::now(),
            execution_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn finish(&self, response: ToolResponse, call_id: String, started: Instant) -> ToolResponse {
        response
            .with_metadata(self.call_metadata(call_id, started))
            .with_status(self.status.snapshot())
    }

    /// Runs `body` through the invocation pipeline.
    pub async fn run<F, Fut>(&self, arguments: Value, body: F) -> ToolResponse
    where
        F: FnOnce(ToolArgs) -> Fut + Send,
        Fut: Future<Output = Result<Value, TrellisError>> + Send,
    {
        let started = Instant::now();
        let name = self.metadata.name.as_str();
        let call_id = self.status.next_call_id(name);

        if !self.status.is_enabled() {
            debug!(tool = %name, "call refused, tool disabled");
            return self.finish(ToolResponse::failure(DISABLED), call_id, started);
        }

        let supplied = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                self.status.record_error();
                let mut details = trellis_core::ValidationDetails::new();
                details.insert(
                    ARGUMENTS_KEY.to_string(),
                    vec![format!("expected an object of named arguments, found {other}")],
                );
                return self.finish(ToolResponse::invalid(details), call_id, started);
            }
        };

        let filled = match validate_arguments(&self.parameters, &supplied) {
            Ok(filled) => filled,
            Err(details) => {
                self.status.record_error();
                debug!(tool = %name, ?details, "{VALIDATION_FAILED}");
                return self.finish(ToolResponse::invalid(details), call_id, started);
            }
        };

        if let Some(limiter) = &self.limiter
            && !limiter.check_and_record().await.is_allowed()
        {
            warn!(tool = %name, limit = limiter.per_minute(), "call refused, rate limit exceeded");
            return self.finish(ToolResponse::failure(RATE_LIMITED), call_id, started);
        }

        let timeout = self.timeout();
        let guarded = AssertUnwindSafe(body(ToolArgs::new(filled))).catch_unwind();
        let outcome = if timeout.is_zero() {
            Some(guarded.await)
        } else {
            tokio::time::timeout(timeout, guarded).await.ok()
        };

        let response = match outcome {
            Some(Ok(Ok(result))) => {
                self.status.record_success();
                ToolResponse::ok(result)
            }
            Some(Ok(Err(err))) => {
                self.status.record_error();
                warn!(tool = %name, error = %err, "tool call failed");
                ToolResponse::from_error(&err)
            }
            Some(Err(panic)) => {
                self.status.record_error();
                let message = panic_message(panic.as_ref());
                warn!(tool = %name, panic = %message, "tool body panicked");
                ToolResponse::raised("Panic", message)
            }
            None => {
                self.status.record_error();
                let err = TrellisError::Timeout { duration: timeout };
                warn!(tool = %name, ?timeout, "tool call timed out");
                ToolResponse::from_error(&err)
            }
        };
        self.finish(response, call_id, started)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool body panicked".to_string()
    }
}

fn raw_entry<'a>(state: &'a StateDict, key: &str) -> Option<&'a Value> {
    let entry = state.get(key)?;
    Some(split_field_entry(entry).map_or(entry, |(_, raw)| raw))
}

fn runtime_mismatch(tool: &str, field: &str, expected: &str) -> TrellisError {
    TrellisError::Deserialization {
        message: format!("runtime field `{field}` of tool {tool} must be {expected}"),
        source: None,
    }
}

fn to_count(value: u64) -> TypedValue {
    TypedValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

impl Operator for ToolCore {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn fields(&self) -> &'static [FieldSpec] {
        TOOL_FIELDS
    }

    fn field(&self, name: &str) -> Option<TypedValue> {
        match name {
            "metadata" => serde_json::to_value(&self.metadata).ok().map(TypedValue::infer),
            "parameters" => serde_json::to_value(&self.parameters).ok().map(TypedValue::infer),
            "config" => Some(TypedValue::Dict(self.config())),
            "enabled" => Some(TypedValue::Bool(self.status.is_enabled())),
            "call_count" => Some(to_count(self.status.call_count())),
            "error_count" => Some(to_count(self.status.error_count())),
            "last_called" => Some(self.status.last_called().into()),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: TypedValue) -> Result<(), TrellisError> {
        let container = self.type_name;
        match (name, value) {
            ("metadata", TypedValue::Dict(map)) => {
                let metadata: ToolMetadata = serde_json::from_value(Value::Object(map))
                    .map_err(|e| TrellisError::deserialization("tool metadata", e))?;
                self.limiter = metadata.rate_limit.map(RateLimiter::new);
                self.metadata = metadata;
            }
            ("parameters", TypedValue::List(items)) => {
                self.parameters = serde_json::from_value(Value::Array(items))
                    .map_err(|e| TrellisError::deserialization("tool parameters", e))?;
            }
            ("config", TypedValue::Dict(map)) => {
                *self.config.get_mut().unwrap_or_else(PoisonError::into_inner) = map;
            }
            ("enabled", TypedValue::Bool(enabled)) => {
                self.status.set_enabled(enabled);
            }
            ("call_count" | "error_count", TypedValue::Int(count)) => {
                let count = u64::try_from(count).unwrap_or(0);
                let counter = if name == "call_count" {
                    &self.status.call_count
                } else {
                    &self.status.error_count
                };
                counter.store(count, Ordering::Release);
            }
            ("last_called", TypedValue::DateTime(at)) => self.status.set_last_called(Some(at)),
            ("last_called", TypedValue::None) => self.status.set_last_called(None),
            (_, value) => {
                return match TOOL_FIELDS.iter().find(|f| f.name == name) {
                    Some(spec) => Err(field_mismatch(container, name, spec.kind, &value)),
                    None => Err(unknown_field(container, name)),
                };
            }
        }
        Ok(())
    }
}

/// Validated, default-filled arguments handed to a tool body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Result<&str, TrellisError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| wrong_type(name, "a string"))
    }

    pub fn i64(&self, name: &str) -> Result<i64, TrellisError> {
        let value = self.require(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| wrong_type(name, "an integer"))
    }

    pub fn f64(&self, name: &str) -> Result<f64, TrellisError> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| wrong_type(name, "a number"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, TrellisError> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| wrong_type(name, "a boolean"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Deserializes all arguments into a typed struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, TrellisError> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| TrellisError::execution(format!("arguments do not fit: {e}")))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    fn require(&self, name: &str) -> Result<&Value, TrellisError> {
        self.values
            .get(name)
            .ok_or_else(|| TrellisError::execution(format!("missing argument `{name}`")))
    }
}

fn wrong_type(name: &str, expected: &str) -> TrellisError {
    TrellisError::execution(format!("argument `{name}` must be {expected}"))
}

/// A named, schema-described, validatable unit of invocable behavior.
///
/// Registries hold `Arc<dyn Capability>` and never the concrete type.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Shared descriptive and runtime state.
    fn core(&self) -> &ToolCore;

    /// The tool body. Receives validated, default-filled arguments.
    async fn execute(&self, args: ToolArgs) -> Result<Value, TrellisError>;

    fn name(&self) -> &str {
        &self.core().metadata().name
    }

    fn description(&self) -> &str {
        &self.core().metadata().description
    }

    fn metadata(&self) -> &ToolMetadata {
        self.core().metadata()
    }

    fn parameters(&self) -> &[ToolParameter] {
        self.core().parameters()
    }

    /// Idempotent.
    fn enable(&self) {
        if self.core().status().set_enabled(true) {
            debug!(tool = %self.name(), "tool enabled");
        }
    }

    /// Idempotent.
    fn disable(&self) {
        if self.core().status().set_enabled(false) {
            debug!(tool = %self.name(), "tool disabled");
        }
    }

    fn is_enabled(&self) -> bool {
        self.core().status().is_enabled()
    }

    fn status(&self) -> StatusSnapshot {
        self.core().status().snapshot()
    }

    fn reset_stats(&self) {
        self.core().status().reset();
    }

    fn to_calling_schema(&self) -> Value {
        self.core().calling_schema()
    }

    fn get_schema(&self) -> Value {
        self.core().full_schema()
    }

    /// Invokes the tool through the full pipeline. Never fails.
    async fn call(&self, arguments: Value) -> ToolResponse {
        self.core()
            .run(arguments, |args| self.execute(args))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::parameter::ParamKind;

    struct Divide {
        core: ToolCore,
    }

    impl Divide {
        fn new() -> Self {
            let mut meta = ToolMetadata::new("divide", "Divides a by b");
            meta.timeout = Some(Duration::from_millis(200));
            Self {
                core: ToolCore::new(
                    meta,
                    vec![
                        ToolParameter::new("a", ParamKind::Number),
                        ToolParameter::new("b", ParamKind::Number),
                        ToolParameter::new("mode", ParamKind::String)
                            .with_default("exact")
                            .one_of(["exact", "floor", "slow", "panic"]),
                    ],
                ),
            }
        }
    }

    #[async_trait]
    impl Capability for Divide {
        fn core(&self) -> &ToolCore {
            &self.core
        }

        async fn execute(&self, args: ToolArgs) -> Result<Value, TrellisError> {
            let (a, b) = (args.f64("a")?, args.f64("b")?);
            match args.str("mode")? {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!(0))
                }
                "panic" => panic!("divide exploded"),
                _ if b == 0.0 => Err(TrellisError::execution("division by zero")),
                "floor" => Ok(json!((a / b).floor())),
                _ => Ok(json!(a / b)),
            }
        }
    }

    #[tokio::test]
    async fn success_counts_and_fills_defaults() {
        let tool = Divide::new();
        let resp = tool.call(json!({"a": 7, "b": 2})).await;
        assert!(resp.success);
        assert_eq!(resp.result, Some(json!(3.5)));
        let status = resp.status.unwrap();
        assert_eq!(status.call_count, 1);
        assert_eq!(status.error_count, 0);
        assert!(status.last_called.is_some());
        assert_eq!(resp.metadata.unwrap().call_id, "divide_1");
    }

    #[tokio::test]
    async fn disabled_short_circuits_without_counting() {
        let tool = Divide::new();
        tool.disable();
        tool.disable();
        let resp = tool.call(json!({"a": 1, "b": 1})).await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some(DISABLED));
        assert_eq!(tool.status().call_count, 0);
        assert_eq!(tool.status().error_count, 0);

        tool.enable();
        assert!(tool.call(json!({"a": 1, "b": 1})).await.success);
    }

    #[tokio::test]
    async fn validation_failure_counts_an_error() {
        let tool = Divide::new();
        let resp = tool.call(json!({"a": "x", "mode": "round"})).await;
        let details = resp.details.unwrap();
        assert!(details.contains_key("a"));
        assert!(details.contains_key("b"));
        assert!(details.contains_key("mode"));
        assert_eq!(tool.status().error_count, 1);
        assert_eq!(tool.status().call_count, 0);
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let resp = Divide::new().call(json!([1, 2])).await;
        assert!(resp.details.unwrap().contains_key(ARGUMENTS_KEY));
    }

    #[tokio::test]
    async fn body_errors_are_absorbed() {
        let tool = Divide::new();
        let resp = tool.call(json!({"a": 1, "b": 0})).await;
        assert_eq!(resp.error.as_deref(), Some("division by zero"));
        assert_eq!(resp.exception.unwrap().kind, "ExecutionError");
        assert_eq!(tool.status().error_count, 1);
    }

    #[tokio::test]
    async fn panics_are_absorbed() {
        let tool = Divide::new();
        let resp = tool.call(json!({"a": 1, "b": 1, "mode": "panic"})).await;
        let exc = resp.exception.unwrap();
        assert_eq!(exc.kind, "Panic");
        assert_eq!(exc.message, "divide exploded");
        assert!(tool.call(json!({"a": 4, "b": 2})).await.success);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_bodies_time_out() {
        let tool = Divide::new();
        let resp = tool.call(json!({"a": 1, "b": 1, "mode": "slow"})).await;
        assert_eq!(resp.exception.unwrap().kind, "Timeout");
        assert_eq!(tool.status().error_count, 1);
    }

    #[tokio::test]
    async fn rate_limit_refuses_without_counting() {
        let mut meta = ToolMetadata::new("ping", "");
        meta.rate_limit = Some(1);
        struct Ping(ToolCore);
        #[async_trait]
        impl Capability for Ping {
            fn core(&self) -> &ToolCore {
                &self.0
            }
            async fn execute(&self, _: ToolArgs) -> Result<Value, TrellisError> {
                Ok(json!("pong"))
            }
        }
        let tool = Ping(ToolCore::new(meta, Vec::new()));
        assert!(tool.call(Value::Null).await.success);
        let refused = tool.call(Value::Null).await;
        assert_eq!(refused.error.as_deref(), Some(RATE_LIMITED));
        assert_eq!(tool.status().call_count, 1);
        assert_eq!(tool.status().error_count, 0);
    }

    #[tokio::test]
    async fn invalid_calls_leave_rate_budget_untouched() {
        let mut meta = ToolMetadata::new("divide", "");
        meta.rate_limit = Some(1);
        let tool = Divide {
            core: ToolCore::new(meta, Divide::new().core.parameters().to_vec()),
        };
        let invalid = tool.call(json!({"a": "x"})).await;
        assert!(invalid.details.is_some());
        assert_eq!(tool.status().error_count, 1);

        assert!(tool.call(json!({"a": 6, "b": 3})).await.success);
        let refused = tool.call(json!({"a": 6, "b": 3})).await;
        assert_eq!(refused.error.as_deref(), Some(RATE_LIMITED));
    }

    #[tokio::test(start_paused = true)]
    async fn undeclared_timeout_follows_default() {
        let meta = ToolMetadata::new("sleepy", "");
        let tool = Divide {
            core: ToolCore::new(meta, Divide::new().core.parameters().to_vec()),
        };
        assert_eq!(tool.core().timeout(), DEFAULT_TIMEOUT);

        tool.core().set_default_timeout(Duration::from_secs(10));
        assert_eq!(tool.core().timeout(), Duration::from_secs(10));
        assert!(tool.call(json!({"a": 1, "b": 1, "mode": "slow"})).await.success);

        tool.core().set_default_timeout(Duration::from_secs(1));
        let resp = tool.call(json!({"a": 1, "b": 1, "mode": "slow"})).await;
        assert_eq!(resp.exception.unwrap().kind, "Timeout");
        assert_eq!(tool.get_schema()["metadata"]["timeout_secs"], 1.0);
    }

    #[test]
    fn declared_timeout_ignores_default() {
        let tool = Divide::new();
        tool.core().set_default_timeout(Duration::from_secs(90));
        assert_eq!(tool.core().timeout(), Duration::from_millis(200));
    }

    #[test]
    fn calling_schema_is_stable() {
        let tool = Divide::new();
        let schema = tool.to_calling_schema();
        assert_eq!(schema, tool.to_calling_schema());
        assert_eq!(schema["name"], "divide");
        assert_eq!(schema["parameters"]["required"], json!(["a", "b"]));
        assert_eq!(schema["parameters"]["properties"]["mode"]["default"], "exact");
    }

    #[tokio::test]
    async fn reset_stats_clears_counters() {
        let tool = Divide::new();
        tool.call(json!({"a": 1, "b": 1})).await;
        tool.call(json!({})).await;
        tool.reset_stats();
        let status = tool.status();
        assert_eq!((status.call_count, status.error_count), (0, 0));
        assert!(status.last_called.is_none());
    }

    #[tokio::test]
    async fn runtime_state_survives_export_and_restore() {
        let tool = Divide::new();
        tool.call(json!({"a": 1, "b": 1})).await;
        tool.call(json!({"a": 1, "b": 0})).await;
        tool.disable();
        tool.core().update_config([("precision".to_string(), json!(2))].into_iter().collect());
        let state = tool.core().export_state();

        let fresh = Divide::new();
        fresh.core().restore_runtime(&state).unwrap();
        assert_eq!(fresh.status().call_count, 1);
        assert_eq!(fresh.status().error_count, 1);
        assert!(!fresh.is_enabled());
        assert_eq!(fresh.core().config()["precision"], 2);
        assert_eq!(fresh.status().last_called, tool.status().last_called);
    }

    #[test]
    fn operator_load_replaces_descriptive_state() {
        let source = Divide::new();
        source.disable();
        let state = source.core().export_state();

        let mut target = ToolCore::new(ToolMetadata::new("other", ""), Vec::new());
        target.load_state(&state, true).unwrap();
        assert_eq!(target.metadata().name, "divide");
        assert_eq!(target.parameters().len(), 3);
        assert!(!target.status().is_enabled());
    }

    #[tokio::test]
    async fn concurrent_calls_are_all_counted() {
        let tool = Arc::new(Divide::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let tool = Arc::clone(&tool);
                tokio::spawn(async move { tool.call(json!({"a": i, "b": 1})).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }
        assert_eq!(tool.status().call_count, 16);
    }
}
