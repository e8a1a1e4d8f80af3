// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary traits implemented outside this workspace.

pub mod model;

pub use model::ConversationModel;
