// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-made capabilities for registry and agent tests.

use std::sync::Arc;

use serde_json::json;
use trellis_core::TrellisError;
use trellis_tool::{Capability, LocalTool, ParamKind, ToolCategory, ToolParameter, ToolRegistry};

fn built(tool: Result<LocalTool, TrellisError>) -> Arc<dyn Capability> {
    match tool {
        Ok(tool) => Arc::new(tool),
        Err(e) => panic!("stock tool is malformed: {e}"),
    }
}

/// `add(a, b)`: whole sums come back as integers.
pub fn add_tool() -> Arc<dyn Capability> {
    built(
        LocalTool::builder("add")
            .description("Adds two numbers")
            .category(ToolCategory::Calculation)
            .param(ToolParameter::new("a", ParamKind::Number).describe("Left operand"))
            .param(ToolParameter::new("b", ParamKind::Number).describe("Right operand"))
            .sync_handler(|args| {
                let sum = args.f64("a")? + args.f64("b")?;
                Ok(if sum.fract() == 0.0 && sum.abs() < 9.0e15 {
                    json!(sum as i64)
                } else {
                    json!(sum)
                })
            })
            .build(),
    )
}

/// `echo(text)`: returns `text` unchanged.
pub fn echo_tool() -> Arc<dyn Capability> {
    built(
        LocalTool::builder("echo")
            .description("Returns its input")
            .category(ToolCategory::Utility)
            .param(ToolParameter::new("text", ParamKind::String).describe("Text to return"))
            .sync_handler(|args| Ok(json!(args.str("text")?)))
            .build(),
    )
}

/// `search(query, limit = 5, lang?)` over a fixed three-entry corpus.
pub fn search_tool() -> Arc<dyn Capability> {
    const CORPUS: [&str; 3] = ["rust ownership", "rust traits", "tokio runtime"];
    built(
        LocalTool::builder("search")
            .description("Searches a small fixed corpus")
            .category(ToolCategory::Search)
            .param(ToolParameter::new("query", ParamKind::String).describe("Substring to find"))
            .param(
                ToolParameter::new("limit", ParamKind::Integer)
                    .describe("Maximum hits")
                    .with_default(5)
                    .min(1.0)
                    .max(20.0),
            )
            .param(
                ToolParameter::new("lang", ParamKind::String)
                    .optional()
                    .one_of(["en", "de"]),
            )
            .sync_handler(|args| {
                let query = args.str("query")?;
                let limit = usize::try_from(args.i64("limit")?).unwrap_or(0);
                let hits: Vec<&str> = CORPUS
                    .iter()
                    .copied()
                    .filter(|entry| entry.contains(query))
                    .take(limit)
                    .collect();
                Ok(json!({"query": query, "hits": hits}))
            })
            .build(),
    )
}

/// `explode(panic = false)`: fails, or panics when asked to.
pub fn explode_tool() -> Arc<dyn Capability> {
    built(
        LocalTool::builder("explode")
            .description("Always fails")
            .category(ToolCategory::Custom)
            .param(ToolParameter::new("panic", ParamKind::Boolean).with_default(false))
            .sync_handler(|args| {
                if args.bool("panic")? {
                    panic!("explode was asked to panic");
                }
                Err(TrellisError::execution("exploded"))
            })
            .build(),
    )
}

/// A registry holding `add`, `echo`, `search`, and `explode`.
pub fn stock_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    if let Err(e) = registry.register_all(vec![add_tool(), echo_tool(), search_tool(), explode_tool()]) {
        panic!("stock tools collide: {e}");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stock_tools_answer() {
        let registry = stock_registry();
        assert_eq!(registry.names(), vec!["add", "echo", "search", "explode"]);

        let sum = registry.call("add", json!({"a": 2, "b": 3})).await;
        assert_eq!(sum.result, Some(json!(5)));

        let hits = registry.call("search", json!({"query": "rust", "limit": 1})).await;
        assert_eq!(hits.result, Some(json!({"query": "rust", "hits": ["rust ownership"]})));

        let failed = registry.call("explode", json!({})).await;
        assert_eq!(failed.error.as_deref(), Some("exploded"));

        let panicked = registry.call("explode", json!({"panic": true})).await;
        assert_eq!(panicked.exception.unwrap().kind, "Panic");
    }
}
