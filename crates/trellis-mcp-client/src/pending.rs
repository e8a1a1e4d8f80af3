// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation table routing each reply to the waiter that sent the request.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::protocol::JsonRpcError;

/// What a waiter receives.
pub type Reply = Result<Value, JsonRpcError>;

/// Outstanding requests keyed by JSON-RPC id.
#[derive(Debug, Default)]
pub struct PendingRequests {
    waiters: DashMap<u64, oneshot::Sender<Reply>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a waiter for `id`.
    pub fn register(&self, id: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);
        rx
    }

    /// Delivers a reply. Returns false when nobody waits for `id` any more.
    pub fn complete(&self, id: u64, reply: Reply) -> bool {
        match self.waiters.remove(&id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => {
                debug!(request_id = id, "discarding reply with no waiter");
                false
            }
        }
    }

    /// Drops the waiter for `id`, e.g. after a timeout.
    pub fn cancel(&self, id: u64) -> bool {
        self.waiters.remove(&id).is_some()
    }

    /// Drops every waiter; their receivers observe a closed channel.
    pub fn close_all(&self) -> usize {
        let count = self.waiters.len();
        self.waiters.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
