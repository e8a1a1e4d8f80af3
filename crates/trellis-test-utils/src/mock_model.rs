// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted conversation model for deterministic testing.
//!
//! `MockModel` implements [`ConversationModel`] by replaying pre-configured
//! assistant turns, so agent loops can be exercised without a real model.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use trellis_core::{Conversation, ConversationModel, Message, ToolCallRequest, TrellisError};

/// One scripted assistant turn.
#[derive(Debug, Clone)]
pub enum MockTurn {
    /// Plain reply with no tool calls.
    Text(String),
    /// Reply requesting the given `(tool, arguments)` calls.
    Calls(Vec<(String, Value)>),
    /// `forward` fails with an execution error carrying this message.
    Fail(String),
}

/// A model that returns pre-configured turns.
///
/// Turns are popped from a FIFO queue. When the queue is empty, a default
/// "mock response" text is returned. Every conversation passed to
/// `forward` is recorded.
pub struct MockModel {
    turns: Arc<Mutex<VecDeque<MockTurn>>>,
    seen: Arc<Mutex<Vec<Conversation>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::with_turns(Vec::new())
    }

    pub fn with_turns(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(VecDeque::from(turns))),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_text(&self, text: impl Into<String>) {
        self.turns.lock().await.push_back(MockTurn::Text(text.into()));
    }

    /// Queues a turn requesting one call to `tool`.
    pub async fn push_call(&self, tool: impl Into<String>, arguments: Value) {
        self.turns
            .lock()
            .await
            .push_back(MockTurn::Calls(vec![(tool.into(), arguments)]));
    }

    /// Conversations received so far, oldest first.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.seen.lock().await.clone()
    }

    /// Scripted turns not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.turns.lock().await.len()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationModel for MockModel {
    fn name(&self) -> &str {
        "mock-model"
    }

    async fn forward(&self, mut conversation: Conversation) -> Result<Conversation, TrellisError> {
        self.seen.lock().await.push(conversation.clone());
        let turn = self
            .turns
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockTurn::Text("mock response".to_string()));

        let reply = match turn {
            MockTurn::Text(text) => Message::assistant(text),
            MockTurn::Calls(calls) => {
                let calls = calls
                    .into_iter()
                    .map(|(name, arguments)| ToolCallRequest {
                        id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                        name,
                        arguments,
                    })
                    .collect();
                Message::assistant_with_calls("", calls)
            }
            MockTurn::Fail(message) => return Err(TrellisError::execution(message)),
        };
        debug!(calls = reply.tool_calls.len(), "mock model turn");
        conversation.push(reply);
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trellis_core::Role;

    use super::*;

    #[tokio::test]
    async fn turns_replay_in_order_then_default() {
        let model = MockModel::with_turns(vec![MockTurn::Text("first".into())]);
        model.push_call("add", json!({"a": 1, "b": 2})).await;

        let mut convo = Conversation::new();
        convo.push(Message::user("go"));

        let convo = model.forward(convo).await.unwrap();
        assert_eq!(convo.last().unwrap().content, "first");

        let convo = model.forward(convo).await.unwrap();
        let calls = convo.pending_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "add");
        assert!(calls[0].id.starts_with("call_"));

        let convo = model.forward(convo).await.unwrap();
        assert_eq!(convo.last().unwrap().content, "mock response");
        assert_eq!(convo.last().unwrap().role, Role::Assistant);
        assert_eq!(model.remaining().await, 0);
    }

    #[tokio::test]
    async fn received_conversations_are_recorded() {
        let model = MockModel::new();
        let mut convo = Conversation::new();
        convo.push(Message::user("hello"));
        model.forward(convo).await.unwrap();

        let seen = model.conversations().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages, vec![Message::user("hello")]);
    }

    #[tokio::test]
    async fn scripted_failure_is_returned() {
        let model = MockModel::with_turns(vec![MockTurn::Fail("model offline".into())]);
        let err = model.forward(Conversation::new()).await.unwrap_err();
        assert_eq!(err.to_string(), TrellisError::execution("model offline").to_string());
    }
}
