// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model turns interleaved with capability dispatch.

use std::sync::Arc;

use futures::future::join_all;
use strum::Display;
use tracing::{debug, info, warn};
use trellis_config::model::AgentConfig;
use trellis_core::{Conversation, ConversationModel, Message, Role, TrellisError};
use trellis_tool::ToolRegistry;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    /// The assistant replied without requesting tools.
    Completed,
    /// `max_turns` model turns ran and the assistant still wanted tools.
    MaxTurns,
}

/// Result of one [`ToolLoop::run`].
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Name of the agent that ran the loop.
    pub agent: String,
    pub conversation: Conversation,
    /// Content of the final assistant message, empty if there was none.
    pub reply: String,
    /// Model turns taken.
    pub turns: usize,
    /// Tool calls dispatched across all turns.
    pub tool_calls: usize,
    pub stop: StopReason,
}

/// Drives a [`ConversationModel`] until it stops asking for tools.
///
/// Each turn offers the registry's calling conventions, forwards the
/// conversation, and dispatches every requested call through the registry.
/// Each call is answered with a tool-role message carrying the JSON envelope.
pub struct ToolLoop {
    name: String,
    model: Arc<dyn ConversationModel>,
    registry: Arc<ToolRegistry>,
    max_turns: usize,
    system_prompt: Option<String>,
}

impl ToolLoop {
    pub fn new(model: Arc<dyn ConversationModel>, registry: Arc<ToolRegistry>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            name: defaults.name,
            model,
            registry,
            max_turns: defaults.max_turns,
            system_prompt: defaults.system_prompt,
        }
    }

    /// Takes `name`, `max_turns` and `system_prompt` from `[agent]`.
    pub fn from_config(
        model: Arc<dyn ConversationModel>,
        registry: Arc<ToolRegistry>,
        config: &AgentConfig,
    ) -> Self {
        Self::new(model, registry)
            .with_name(config.name.clone())
            .with_max_turns(config.max_turns)
            .with_system_prompt(config.system_prompt.clone())
    }

    /// Name recorded in logs and in each [`LoopOutcome`].
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Starts a conversation from `input` and runs it to completion.
    pub async fn run(&self, input: &str) -> Result<LoopOutcome, TrellisError> {
        let mut conversation = Conversation::new();
        if let Some(prompt) = &self.system_prompt {
            conversation.push(Message::system(prompt.clone()));
        }
        conversation.push(Message::user(input));
        self.resume(conversation).await
    }

    /// Continues an existing conversation.
    ///
    /// Calls left pending by a trailing assistant message are dispatched
    /// before the first model turn.
    pub async fn resume(&self, mut conversation: Conversation) -> Result<LoopOutcome, TrellisError> {
        let mut turns = 0;
        let mut tool_calls = self.dispatch_pending(&mut conversation).await;

        while turns < self.max_turns {
            conversation.tools = self.registry.calling_conventions();
            let before = conversation.messages.len();
            conversation = self.model.forward(conversation).await?;
            turns += 1;

            match conversation.messages.get(before..) {
                Some([reply]) if reply.role == Role::Assistant => {}
                _ => {
                    return Err(TrellisError::Internal(format!(
                        "model `{}` must append exactly one assistant message per turn",
                        self.model.name()
                    )));
                }
            }

            if conversation.pending_tool_calls().is_empty() {
                debug!(agent = %self.name, turns, tool_calls, "assistant finished");
                return Ok(self.finish(conversation, turns, tool_calls, StopReason::Completed));
            }
            tool_calls += self.dispatch_pending(&mut conversation).await;
        }

        warn!(
            agent = %self.name,
            max_turns = self.max_turns,
            tool_calls,
            "tool loop hit its turn limit"
        );
        Ok(self.finish(conversation, turns, tool_calls, StopReason::MaxTurns))
    }

    /// Dispatches the trailing assistant message's calls concurrently and
    /// appends the replies in request order.
    async fn dispatch_pending(&self, conversation: &mut Conversation) -> usize {
        let calls = conversation.pending_tool_calls().to_vec();
        if calls.is_empty() {
            return 0;
        }
        let responses = join_all(calls.iter().map(|call| {
            debug!(agent = %self.name, tool = %call.name, call_id = %call.id, "dispatching tool call");
            self.registry.call(&call.name, call.arguments.clone())
        }))
        .await;

        for (call, response) in calls.iter().zip(responses) {
            if !response.success {
                info!(
                    agent = %self.name,
                    tool = %call.name,
                    error = response.error.as_deref().unwrap_or_default(),
                    "tool call failed"
                );
            }
            conversation.push(Message::tool_result(call, response.to_json().to_string()));
        }
        calls.len()
    }

    fn finish(&self, conversation: Conversation, turns: usize, tool_calls: usize, stop: StopReason) -> LoopOutcome {
        let reply = conversation
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        LoopOutcome {
            agent: self.name.clone(),
            conversation,
            reply,
            turns,
            tool_calls,
            stop,
        }
    }
}
