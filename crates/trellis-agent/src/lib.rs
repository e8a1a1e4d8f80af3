// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool-calling agent loop for Trellis.
//!
//! The [`ToolLoop`] is the coordinator that:
//! - Builds a conversation from an optional system prompt and user input
//! - Offers the registry's calling conventions to the model
//! - Dispatches every requested tool call through the registry
//! - Stops when the assistant answers without tools or the turn limit is hit

pub mod tool_loop;

pub use tool_loop::{LoopOutcome, StopReason, ToolLoop};
