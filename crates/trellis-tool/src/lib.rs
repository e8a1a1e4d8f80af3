// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capabilities ("tools") and the registry that dispatches them.
//!
//! A [`Capability`] couples descriptive [`ToolMetadata`], a parameter
//! contract of [`ToolParameter`]s, and an async body. Calling it always
//! yields a [`ToolResponse`] envelope. [`LocalTool`] builds a capability
//! from a closure; remote adapters live in `trellis-mcp-client`.
//! [`ToolRegistry`] holds capabilities by name and category and exports
//! function-calling schemas for a model.

pub mod local;
pub mod metadata;
pub mod parameter;
pub mod rate_limit;
pub mod registry;
pub mod response;
pub mod tool;

pub use local::{LocalTool, LocalToolBuilder};
pub use metadata::{AccessLevel, ToolCategory, ToolMetadata};
pub use parameter::{ParamKind, ToolParameter, validate_arguments};
pub use registry::ToolRegistry;
pub use response::{CallMetadata, ExceptionInfo, StatusSnapshot, ToolResponse};
pub use tool::{Capability, ToolArgs, ToolCore, ToolStatus};
