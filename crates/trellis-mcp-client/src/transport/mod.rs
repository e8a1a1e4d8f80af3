// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Byte-level links to an MCP server.
//!
//! A transport only moves whole JSON-RPC frames. Outbound frames go through
//! [`Transport::send`]; inbound frames arrive on the channel returned when
//! the transport is opened, fed by the transport's own background task.
//! The channel closes when the server goes away.

pub mod sse;
pub mod stdio;

use async_trait::async_trait;
use tokio::sync::mpsc;
use trellis_core::TrellisError;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

/// Capacity of the inbound frame channel.
pub(crate) const INBOUND_CAPACITY: usize = 64;

/// Inbound frames, one JSON document per item.
pub type Inbound = mpsc::Receiver<String>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one serialized frame.
    async fn send(&self, frame: String) -> Result<(), TrellisError>;

    /// Tears the link down. Idempotent.
    async fn close(&self);
}
