// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Trellis integration tests.
//!
//! Provides a scripted model and stock capabilities for fast,
//! deterministic tests without external services.
//!
//! # Components
//!
//! - [`MockModel`] - Conversation model replaying scripted turns
//! - [`stock_registry`] - Registry preloaded with `add`, `echo`, `search`, `explode`

pub mod mock_model;
pub mod tools;

pub use mock_model::{MockModel, MockTurn};
pub use tools::{add_tool, echo_tool, explode_tool, search_tool, stock_registry};
