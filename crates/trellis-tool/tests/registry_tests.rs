// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end dispatch and persistence through the public registry API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use trellis_core::{Operator, Persist, StateFormat, TrellisError};
use trellis_tool::{
    Capability, LocalTool, ParamKind, ToolArgs, ToolCategory, ToolParameter, ToolRegistry,
};

fn add() -> Arc<dyn Capability> {
    Arc::new(
        LocalTool::builder("add")
            .description("Adds two numbers")
            .category(ToolCategory::Calculation)
            .param(ToolParameter::new("a", ParamKind::Number).describe("left operand"))
            .param(ToolParameter::new("b", ParamKind::Number).describe("right operand"))
            .sync_handler(|args| {
                let sum = args.f64("a")? + args.f64("b")?;
                Ok(if sum.fract() == 0.0 { json!(sum as i64) } else { json!(sum) })
            })
            .build()
            .expect("add is well formed"),
    )
}

fn search() -> Arc<dyn Capability> {
    Arc::new(
        LocalTool::builder("search")
            .description("Searches the index")
            .category(ToolCategory::Search)
            .param(ToolParameter::new("query", ParamKind::String))
            .param(
                ToolParameter::new("limit", ParamKind::Integer)
                    .with_default(5)
                    .min(1.0)
                    .max(20.0),
            )
            .param(
                ToolParameter::new("lang", ParamKind::String)
                    .optional()
                    .one_of(["en", "de"]),
            )
            .sync_handler(|args| Ok(json!({"query": args.str("query")?, "limit": args.i64("limit")?})))
            .build()
            .expect("search is well formed"),
    )
}

#[tokio::test]
async fn add_two_and_three() {
    let registry = ToolRegistry::new();
    registry.register(add()).unwrap();

    let resp = registry.call("add", json!({"a": 2, "b": 3})).await;
    assert!(resp.success);
    assert_eq!(resp.result, Some(json!(5)));
    assert_eq!(resp.status.unwrap().call_count, 1);
}

#[tokio::test]
async fn unknown_name_is_an_envelope_not_an_error() {
    let registry = ToolRegistry::new();
    registry.register(add()).unwrap();

    let resp = registry.call("subtract", json!({"a": 1, "b": 1})).await;
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("unknown capability"));
    assert_eq!(registry.get("add").unwrap().status().error_count, 0);
}

#[tokio::test]
async fn missing_required_query() {
    let registry = ToolRegistry::new();
    registry.register(search()).unwrap();

    let resp = registry.call("search", json!({})).await;
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("validation failed"));
    let details = serde_json::to_value(resp.details.unwrap()).unwrap();
    assert_eq!(details, json!({"query": ["required"]}));
}

#[tokio::test]
async fn constraint_violations_name_each_parameter() {
    let registry = ToolRegistry::new();
    registry.register(search()).unwrap();

    let resp = registry
        .call("search", json!({"query": "q", "limit": 0, "lang": "fr"}))
        .await;
    let details = resp.details.unwrap();
    assert!(details.contains_key("limit"));
    assert!(details.contains_key("lang"));
    assert!(!details.contains_key("query"));

    let ok = registry.call("search", json!({"query": "q", "lang": "en"})).await;
    assert_eq!(ok.result, Some(json!({"query": "q", "limit": 5})));
}

#[test]
fn calling_conventions_match_function_calling_shape() {
    let registry = ToolRegistry::new();
    registry.register(search()).unwrap();

    let conventions = registry.calling_conventions();
    assert_eq!(
        conventions[0],
        json!({
            "type": "function",
            "function": {
                "name": "search",
                "description": "Searches the index",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": ""},
                        "limit": {
                            "type": "integer",
                            "description": "",
                            "minimum": 1.0,
                            "maximum": 20.0,
                            "default": 5
                        },
                        "lang": {"type": "string", "description": "", "enum": ["en", "de"]}
                    },
                    "required": ["query"]
                }
            }
        })
    );
}

#[test]
fn different_tool_same_name_is_a_duplicate() {
    let registry = ToolRegistry::new();
    registry.register(add()).unwrap();
    assert!(matches!(
        registry.register(add()),
        Err(TrellisError::DuplicateName { .. })
    ));
}

#[tokio::test]
async fn registry_state_survives_a_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.yaml");

    let registry = ToolRegistry::new();
    registry.register_all(vec![add(), search()]).unwrap();
    registry.call("add", json!({"a": 1, "b": 2})).await;
    registry.call("add", json!({"a": "x"})).await;
    registry.get("search").unwrap().disable();
    registry.save(&path, StateFormat::Auto, true).unwrap();

    let mut restored = ToolRegistry::new();
    restored.register_all(vec![add(), search()]).unwrap();
    restored.load(&path, StateFormat::Auto, true).unwrap();

    let add_status = restored.get("add").unwrap().status();
    assert_eq!((add_status.call_count, add_status.error_count), (1, 1));
    assert!(!restored.get("search").unwrap().is_enabled());
    assert_eq!(restored.all_schemas().len(), 1);
}

#[tokio::test]
async fn failing_tool_does_not_disturb_the_registry() {
    let explode: Arc<dyn Capability> = Arc::new(
        LocalTool::builder("explode")
            .sync_handler(|_| -> Result<Value, TrellisError> { panic!("kaboom") })
            .build()
            .unwrap(),
    );
    let registry = ToolRegistry::new();
    registry.register_all(vec![explode, add()]).unwrap();

    let resp = registry.call("explode", json!({})).await;
    assert_eq!(resp.exception.unwrap().kind, "Panic");
    assert!(registry.call("add", json!({"a": 1, "b": 1})).await.success);
    assert_eq!(registry.export_state().len(), 2);
}

fn nap(declared: Option<Duration>) -> Arc<dyn Capability> {
    let builder = LocalTool::builder("nap").handler(|_: ToolArgs| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok::<_, TrellisError>(json!("rested"))
    });
    let builder = match declared {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    };
    Arc::new(builder.build().unwrap())
}

#[tokio::test(start_paused = true)]
async fn registry_default_timeout_governs_undeclared_tools() {
    let lenient = ToolRegistry::new();
    lenient.register(nap(None)).unwrap();
    assert!(lenient.call("nap", json!({})).await.success);

    let strict = ToolRegistry::new().with_default_timeout(Duration::from_secs(1));
    strict.register(nap(None)).unwrap();
    let resp = strict.call("nap", json!({})).await;
    assert_eq!(resp.exception.unwrap().kind, "Timeout");

    let declared = ToolRegistry::new().with_default_timeout(Duration::from_secs(1));
    declared.register_all(vec![nap(Some(Duration::from_secs(10)))]).unwrap();
    assert!(declared.call("nap", json!({})).await.success);
}
