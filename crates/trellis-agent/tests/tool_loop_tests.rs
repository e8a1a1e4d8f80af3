// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent loop against the scripted model and stock tools.

use std::sync::Arc;

use serde_json::{Value, json};
use trellis_agent::{StopReason, ToolLoop};
use trellis_config::model::AgentConfig;
use trellis_core::{Role, TrellisError};
use trellis_test_utils::{MockModel, MockTurn, stock_registry};

fn envelope(content: &str) -> Value {
    serde_json::from_str(content).unwrap()
}

#[tokio::test]
async fn tool_result_is_fed_back_before_the_final_answer() {
    let model = Arc::new(MockModel::with_turns(vec![
        MockTurn::Calls(vec![("add".into(), json!({"a": 2, "b": 3}))]),
        MockTurn::Text("The sum is 5.".into()),
    ]));
    let agent = ToolLoop::new(model.clone(), Arc::new(stock_registry()));

    let outcome = agent.run("what is 2 + 3?").await.unwrap();
    assert_eq!(outcome.stop, StopReason::Completed);
    assert_eq!(outcome.reply, "The sum is 5.");
    assert_eq!((outcome.turns, outcome.tool_calls), (2, 1));

    let roles: Vec<Role> = outcome.conversation.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);

    let tool_msg = &outcome.conversation.messages[2];
    assert_eq!(tool_msg.name.as_deref(), Some("add"));
    let result = envelope(&tool_msg.content);
    assert_eq!(result["success"], true);
    assert_eq!(result["result"], 5);

    // Second turn saw the tool reply and was offered every stock tool.
    let seen = model.conversations().await;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].messages.len(), 3);
    assert_eq!(seen[0].tools.len(), 4);
    assert_eq!(seen[0].tools[0]["type"], "function");
}

#[tokio::test]
async fn failures_are_reported_to_the_model_not_raised() {
    let model = Arc::new(MockModel::with_turns(vec![
        MockTurn::Calls(vec![
            ("explode".into(), json!({"panic": true})),
            ("nope".into(), json!({})),
            ("search".into(), json!({})),
        ]),
        MockTurn::Text("done".into()),
    ]));
    let agent = ToolLoop::new(model, Arc::new(stock_registry()));

    let outcome = agent.run("try everything").await.unwrap();
    assert_eq!(outcome.tool_calls, 3);
    let replies: Vec<Value> = outcome
        .conversation
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| envelope(&m.content))
        .collect();
    assert_eq!(replies[0]["exception"]["type"], "Panic");
    assert_eq!(replies[1]["error"], "unknown capability");
    assert_eq!(replies[2]["details"], json!({"query": ["required"]}));
}

#[tokio::test]
async fn turn_limit_stops_a_model_that_never_finishes() {
    let call = || MockTurn::Calls(vec![("echo".into(), json!({"text": "again"}))]);
    let model = Arc::new(MockModel::with_turns(vec![call(), call(), call(), call()]));
    let config = AgentConfig {
        max_turns: 2,
        system_prompt: Some("Be brief.".into()),
        ..AgentConfig::default()
    };
    let agent = ToolLoop::from_config(model.clone(), Arc::new(stock_registry()), &config);

    let outcome = agent.run("loop").await.unwrap();
    assert_eq!(outcome.stop, StopReason::MaxTurns);
    assert_eq!((outcome.turns, outcome.tool_calls), (2, 2));
    assert_eq!(outcome.conversation.messages[0].role, Role::System);
    assert_eq!(model.remaining().await, 2);
}

#[tokio::test]
async fn model_errors_propagate() {
    let model = Arc::new(MockModel::with_turns(vec![MockTurn::Fail("offline".into())]));
    let agent = ToolLoop::new(model, Arc::new(stock_registry()));
    let err = agent.run("hello").await.unwrap_err();
    assert!(matches!(err, TrellisError::Execution(_)));
}

#[tokio::test]
async fn resume_dispatches_calls_left_pending() {
    let registry = Arc::new(stock_registry());
    let first = ToolLoop::new(
        Arc::new(MockModel::with_turns(vec![MockTurn::Calls(vec![(
            "echo".into(),
            json!({"text": "carried"}),
        )])])),
        Arc::clone(&registry),
    )
    .with_max_turns(1);
    let mut paused = first.run("start").await.unwrap().conversation;
    // Drop the tool reply so the assistant's call is pending again.
    paused.messages.pop();

    let second = ToolLoop::new(Arc::new(MockModel::new()), Arc::clone(&registry));
    let outcome = second.resume(paused).await.unwrap();
    assert_eq!(outcome.stop, StopReason::Completed);
    assert_eq!(outcome.reply, "mock response");
    assert_eq!(registry.get("echo").unwrap().status().call_count, 2);
}
