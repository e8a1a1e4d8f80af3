// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The language-model boundary.

use async_trait::async_trait;

use crate::error::TrellisError;
use crate::types::Conversation;

/// A chat model that advances a conversation by one assistant turn.
///
/// `forward` appends exactly one assistant message, which may request zero
/// or more tool calls. The offered calling conventions travel in
/// [`Conversation::tools`].
#[async_trait]
pub trait ConversationModel: Send + Sync {
    fn name(&self) -> &str;

    async fn forward(&self, conversation: Conversation) -> Result<Conversation, TrellisError>;
}
