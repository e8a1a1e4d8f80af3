// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote tools presented as local capabilities.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use trellis_core::TrellisError;
use trellis_tool::{
    Capability, ParamKind, ToolArgs, ToolCategory, ToolCore, ToolMetadata, ToolParameter,
    ToolRegistry,
};

use crate::client::RemoteBridge;
use crate::protocol::RemoteTool;

/// Converts a JSON-Schema `inputSchema` into a parameter contract.
///
/// Properties keep their declaration order. Types the contract cannot
/// express become [`ParamKind::Any`].
pub fn parameters_from_schema(schema: &Value) -> Vec<ToolParameter> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .filter_map(|(name, prop)| {
            let prop = prop.as_object()?;
            let mut param = ToolParameter::new(name.clone(), ParamKind::from_schema_type(prop.get("type")));
            param.description = prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            param.required = required.contains(&name.as_str());
            param.default = prop.get("default").filter(|d| !d.is_null()).cloned();
            param.allowed = prop.get("enum").and_then(Value::as_array).cloned();
            param.minimum = prop.get("minimum").and_then(Value::as_f64);
            param.maximum = prop.get("maximum").and_then(Value::as_f64);
            param.pattern = prop.get("pattern").and_then(Value::as_str).map(str::to_string);
            Some(param)
        })
        .collect()
}

/// A remote tool wrapped in the local capability contract.
///
/// The body serializes the validated arguments, calls the bridge, and
/// turns the remote result into a value. Transport failures surface as
/// failure envelopes through the usual pipeline.
pub struct McpToolAdapter {
    core: ToolCore,
    remote_name: String,
    bridge: Arc<dyn RemoteBridge>,
}

impl McpToolAdapter {
    /// Wraps `tool`, registering it as `prefix_name` when a prefix is given.
    pub fn new(
        bridge: Arc<dyn RemoteBridge>,
        tool: &RemoteTool,
        prefix: Option<&str>,
    ) -> Result<Self, TrellisError> {
        let local_name = match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}_{}", tool.name),
            _ => tool.name.clone(),
        };
        let description = tool
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("MCP tool: {}", tool.name));

        let mut metadata = ToolMetadata::new(local_name, description);
        metadata.category = ToolCategory::Custom;
        metadata.tags = vec!["mcp".to_string(), bridge.server_id().to_string()];
        // The bridge enforces its own request timeout.
        metadata.timeout = Some(Duration::ZERO);
        metadata.validate()?;

        Ok(Self {
            core: ToolCore::new(metadata, parameters_from_schema(&tool.input_schema))
                .with_type_name("McpToolAdapter"),
            remote_name: tool.name.clone(),
            bridge,
        })
    }

    /// Name of the tool on the remote server.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn server_id(&self) -> &str {
        self.bridge.server_id()
    }
}

#[async_trait]
impl Capability for McpToolAdapter {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, TrellisError> {
        let result = self.bridge.invoke(&self.remote_name, args.into_value()).await?;
        if result.is_error {
            let detail = result.text().unwrap_or_else(|| "no details".to_string());
            return Err(TrellisError::execution(format!("MCP tool error: {detail}")));
        }
        Ok(result.into_value())
    }
}

/// Lists `bridge`'s capabilities and registers an adapter for each.
///
/// Listing happens before anything is registered, and registration is a
/// single batch, so a failure leaves `registry` untouched.
pub async fn attach_to_registry(
    registry: &ToolRegistry,
    bridge: Arc<dyn RemoteBridge>,
    prefix: Option<&str>,
) -> Result<Vec<Arc<dyn Capability>>, TrellisError> {
    let remote = bridge.list_capabilities().await?;
    let adapters = remote
        .iter()
        .filter(|tool| !tool.name.is_empty())
        .map(|tool| {
            McpToolAdapter::new(Arc::clone(&bridge), tool, prefix)
                .map(|adapter| Arc::new(adapter) as Arc<dyn Capability>)
        })
        .collect::<Result<Vec<_>, _>>()?;
    registry.register_all(adapters.clone())?;
    info!(server = %bridge.server_id(), count = adapters.len(), "attached remote tools");
    for adapter in &adapters {
        debug!(tool = %adapter.name(), "remote tool available");
    }
    Ok(adapters)
}
