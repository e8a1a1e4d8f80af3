// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process tools built from closures.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use trellis_core::TrellisError;

use crate::metadata::{AccessLevel, ToolCategory, ToolMetadata};
use crate::parameter::ToolParameter;
use crate::tool::{Capability, ToolArgs, ToolCore};

type Handler = Arc<dyn Fn(ToolArgs) -> BoxFuture<'static, Result<Value, TrellisError>> + Send + Sync>;

/// A tool whose body is a Rust closure.
pub struct LocalTool {
    core: ToolCore,
    handler: Handler,
}

impl LocalTool {
    pub fn builder(name: impl Into<String>) -> LocalToolBuilder {
        LocalToolBuilder {
            metadata: ToolMetadata::new(name, ""),
            parameters: Vec::new(),
            config: Map::new(),
            handler: None,
        }
    }

    /// Mutable access for loading a saved tool state.
    pub fn core_mut(&mut self) -> &mut ToolCore {
        &mut self.core
    }
}

impl std::fmt::Debug for LocalTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTool")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Capability for LocalTool {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, TrellisError> {
        (self.handler)(args).await
    }
}

/// Builder for [`LocalTool`].
pub struct LocalToolBuilder {
    metadata: ToolMetadata,
    parameters: Vec<ToolParameter>,
    config: Map<String, Value>,
    handler: Option<Handler>,
}

impl LocalToolBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.metadata.version = version.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.metadata.author = Some(author.into());
        self
    }

    pub fn category(mut self, category: ToolCategory) -> Self {
        self.metadata.category = category;
        self
    }

    pub fn access(mut self, access: AccessLevel) -> Self {
        self.metadata.access = access;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    /// Calls allowed per minute.
    pub fn rate_limit(mut self, per_minute: u32) -> Self {
        self.metadata.rate_limit = Some(per_minute);
        self
    }

    /// Zero disables the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.metadata.timeout = Some(timeout);
        self
    }

    pub fn requires_auth(mut self) -> Self {
        self.metadata.requires_auth = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.metadata.deprecated = true;
        self
    }

    pub fn param(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Async body.
    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TrellisError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |args| f(args).boxed()));
        self
    }

    /// Blocking-free synchronous body.
    pub fn sync_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(ToolArgs) -> Result<Value, TrellisError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(move |args| futures::future::ready(f(args)).boxed()));
        self
    }

    /// Validates the name, version, and parameter list.
    pub fn build(self) -> Result<LocalTool, TrellisError> {
        self.metadata.validate()?;
        {
            let mut seen = HashSet::new();
            for param in &self.parameters {
                if param.name.is_empty() || !seen.insert(param.name.as_str()) {
                    return Err(TrellisError::InvalidName {
                        name: param.name.clone(),
                        reason: format!(
                            "parameter names of tool `{}` must be non-empty and unique",
                            self.metadata.name
                        ),
                    });
                }
            }
        }
        let Some(handler) = self.handler else {
            return Err(TrellisError::InvalidName {
                name: self.metadata.name,
                reason: "tool has no handler".to_string(),
            });
        };
        Ok(LocalTool {
            core: ToolCore::new(self.metadata, self.parameters)
                .with_type_name("LocalTool")
                .with_config(self.config),
            handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::parameter::ParamKind;

    #[tokio::test]
    async fn closure_tool_runs_through_pipeline() {
        let tool = LocalTool::builder("greet")
            .description("Greets someone")
            .param(ToolParameter::new("who", ParamKind::String))
            .param(ToolParameter::new("punct", ParamKind::String).with_default("!"))
            .handler(|args: ToolArgs| async move {
                let greeting = format!("hello {}{}", args.str("who")?, args.str("punct")?);
                Ok::<_, TrellisError>(json!(greeting))
            })
            .build()
            .unwrap();

        let resp = tool.call(json!({"who": "ada"})).await;
        assert_eq!(resp.result, Some(json!("hello ada!")));
    }

    #[tokio::test]
    async fn sync_handler_and_config() {
        let tool = LocalTool::builder("const")
            .config("answer", 42)
            .sync_handler(|_| Ok(json!(true)))
            .build()
            .unwrap();
        assert_eq!(tool.core().config()["answer"], 42);
        assert!(tool.call(json!({})).await.success);
    }

    #[test]
    fn build_rejects_bad_definitions() {
        let no_handler = LocalTool::builder("x").build();
        assert!(matches!(no_handler, Err(TrellisError::InvalidName { .. })));

        let dup = LocalTool::builder("x")
            .param(ToolParameter::new("a", ParamKind::Any))
            .param(ToolParameter::new("a", ParamKind::Any))
            .sync_handler(|_| Ok(Value::Null))
            .build();
        assert!(dup.is_err());

        let bad_name = LocalTool::builder("no spaces")
            .sync_handler(|_| Ok(Value::Null))
            .build();
        assert!(bad_name.is_err());

        let bad_version = LocalTool::builder("v")
            .version("latest")
            .sync_handler(|_| Ok(Value::Null))
            .build();
        assert!(bad_version.is_err());
    }
}
