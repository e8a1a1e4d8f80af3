// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connects every configured MCP server and attaches its tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use trellis_config::McpServerConfig;
use trellis_core::TrellisError;
use trellis_tool::ToolRegistry;

use crate::adapter::attach_to_registry;
use crate::client::{McpClient, RemoteBridge};

/// Live MCP sessions keyed by server id.
#[derive(Default)]
pub struct ServerManager {
    clients: BTreeMap<String, Arc<McpClient>>,
    failures: BTreeMap<String, TrellisError>,
}

impl ServerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects each enabled server and registers its tools into `registry`.
    ///
    /// A server that fails to connect or attach is recorded in
    /// [`ServerManager::failures`]; the others are unaffected.
    pub async fn connect_all(servers: &[McpServerConfig], registry: &ToolRegistry) -> Self {
        let mut manager = Self::new();
        for config in servers {
            if !config.enabled {
                info!(server = %config.id, "MCP server disabled, skipping");
                continue;
            }
            if let Err(e) = manager.connect(config, registry).await {
                warn!(server = %config.id, error = %e, "MCP server unavailable");
                manager.failures.insert(config.id.clone(), e);
            }
        }
        manager
    }

    /// Connects one server and attaches its tools with the configured prefix.
    pub async fn connect(
        &mut self,
        config: &McpServerConfig,
        registry: &ToolRegistry,
    ) -> Result<usize, TrellisError> {
        let client = Arc::new(McpClient::connect(config).await?);
        let bridge: Arc<dyn RemoteBridge> = client.clone();
        let attached = match attach_to_registry(registry, bridge, config.tool_prefix.as_deref()).await {
            Ok(adapters) => adapters.len(),
            Err(e) => {
                client.shutdown().await;
                return Err(e);
            }
        };
        if let Some(previous) = self.clients.insert(config.id.clone(), client) {
            previous.shutdown().await;
        }
        self.failures.remove(&config.id);
        Ok(attached)
    }

    pub fn client(&self, server_id: &str) -> Option<Arc<McpClient>> {
        self.clients.get(server_id).cloned()
    }

    pub fn server_ids(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    /// Servers that could not be connected, with the reason.
    pub fn failures(&self) -> &BTreeMap<String, TrellisError> {
        &self.failures
    }

    pub async fn shutdown_all(&mut self) {
        for (_, client) in std::mem::take(&mut self.clients) {
            client.shutdown().await;
        }
    }
}
