// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP client for Trellis.
//!
//! Connects to remote MCP servers over a child process's stdio or over an
//! HTTP event stream, correlates JSON-RPC replies with their requests, and
//! exposes every remote tool as a [`trellis_tool::Capability`] through
//! [`attach_to_registry`]. [`ServerManager`] does the same for every
//! server listed in `[[mcp.servers]]`.

pub mod adapter;
pub mod client;
pub mod manager;
pub mod pending;
pub mod protocol;
pub mod transport;

pub use adapter::{McpToolAdapter, attach_to_registry, parameters_from_schema};
pub use client::{DEFAULT_REQUEST_TIMEOUT, McpClient, RemoteBridge};
pub use manager::ServerManager;
pub use pending::PendingRequests;
pub use protocol::{CallToolResult, RemoteTool};
pub use transport::{SseTransport, StdioTransport, Transport};
