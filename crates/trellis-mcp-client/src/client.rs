// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP session over any [`Transport`].
//!
//! One background task reads inbound frames and routes replies through the
//! [`PendingRequests`] table; callers suspend only inside
//! [`McpClient::request`]. Any number of requests may be outstanding at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trellis_config::{McpServerConfig, McpTransport};
use trellis_core::TrellisError;

use crate::pending::PendingRequests;
use crate::protocol::{
    CallToolResult, Incoming, JsonRpcRequest, ListToolsResult, METHOD_NOT_FOUND, RemoteTool,
    error_frame, initialize_params, notification_frame, result_frame,
};
use crate::transport::{Inbound, SseTransport, StdioTransport, Transport};

/// Default wait for a correlated reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A remote capability host, seen through list and invoke.
#[async_trait]
pub trait RemoteBridge: Send + Sync {
    /// Identifier of the remote server.
    fn server_id(&self) -> &str;

    /// Every capability the server advertises.
    async fn list_capabilities(&self) -> Result<Vec<RemoteTool>, TrellisError>;

    /// Calls one remote capability and waits for its correlated result.
    async fn invoke(&self, name: &str, arguments: Value) -> Result<CallToolResult, TrellisError>;
}

/// Client side of one MCP session.
pub struct McpClient {
    server_id: String,
    transport: Arc<dyn Transport>,
    pending: Arc<PendingRequests>,
    next_id: AtomicU64,
    request_timeout: Duration,
    router: JoinHandle<()>,
    server_info: OnceLock<Value>,
}

impl McpClient {
    /// Starts routing `inbound` frames. No handshake is performed.
    pub fn start(
        server_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        inbound: Inbound,
        request_timeout: Duration,
    ) -> Self {
        let server_id = server_id.into();
        let pending = Arc::new(PendingRequests::new());
        let router = tokio::spawn(route_inbound(
            server_id.clone(),
            inbound,
            Arc::clone(&pending),
            Arc::clone(&transport),
        ));
        Self {
            server_id,
            transport,
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            router,
            server_info: OnceLock::new(),
        }
    }

    /// Spawns a server process and completes the handshake.
    pub async fn connect_stdio(config: &McpServerConfig) -> Result<Self, TrellisError> {
        let command = config.command.as_deref().ok_or_else(|| {
            TrellisError::Config(format!("MCP server `{}` has no command", config.id))
        })?;
        let (transport, inbound) =
            StdioTransport::spawn(command, &config.args, &config.env, config.cwd.as_deref())?;
        let client = Self::start(
            config.id.clone(),
            Arc::new(transport),
            inbound,
            Duration::from_secs(config.request_timeout_secs),
        );
        client.initialize().await?;
        Ok(client)
    }

    /// Opens an event stream and completes the handshake.
    pub async fn connect_sse(config: &McpServerConfig) -> Result<Self, TrellisError> {
        let url = config.url.as_deref().ok_or_else(|| {
            TrellisError::Config(format!("MCP server `{}` has no url", config.id))
        })?;
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let (transport, inbound) = SseTransport::connect(url, &config.headers, timeout).await?;
        let client = Self::start(config.id.clone(), Arc::new(transport), inbound, timeout);
        client.initialize().await?;
        Ok(client)
    }

    /// Connects using the configured transport.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, TrellisError> {
        match config.transport {
            McpTransport::Stdio => Self::connect_stdio(config).await,
            McpTransport::Sse => Self::connect_sse(config).await,
        }
    }

    /// `initialize` followed by `notifications/initialized`.
    pub async fn initialize(&self) -> Result<&Value, TrellisError> {
        let info = self.request("initialize", Some(initialize_params())).await?;
        self.notify("notifications/initialized", None).await?;
        let version = info
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(server = %self.server_id, protocol = version, "MCP session initialized");
        Ok(self.server_info.get_or_init(|| info))
    }

    /// What the server reported during `initialize`.
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.get()
    }

    /// Sends a request and waits for its correlated reply.
    ///
    /// On timeout the waiter is deregistered, so a late reply is discarded.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TrellisError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&JsonRpcRequest::new(id, method, params)).map_err(|e| {
            TrellisError::Serialization {
                message: format!("encoding `{method}` request"),
                source: Some(Box::new(e)),
            }
        })?;

        let reply = self.pending.register(id);
        if let Err(e) = self.transport.send(frame).await {
            self.pending.cancel(id);
            return Err(e);
        }
        debug!(server = %self.server_id, request_id = id, method, "request sent");

        match tokio::time::timeout(self.request_timeout, reply).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(rpc))) => Err(TrellisError::protocol(format!(
                "`{method}` failed on {}: {rpc}",
                self.server_id
            ))),
            Ok(Err(_)) => Err(TrellisError::protocol(format!(
                "connection to {} closed while waiting for `{method}`",
                self.server_id
            ))),
            Err(_) => {
                self.pending.cancel(id);
                warn!(server = %self.server_id, request_id = id, method, "request timed out");
                Err(TrellisError::RemoteTimeout {
                    method: method.to_string(),
                    duration: self.request_timeout,
                })
            }
        }
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TrellisError> {
        self.transport
            .send(notification_frame(method, params).to_string())
            .await
    }

    /// Requests currently awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Closes the transport and fails every outstanding request.
    pub async fn shutdown(&self) {
        self.transport.close().await;
        self.router.abort();
        let dropped = self.pending.close_all();
        info!(server = %self.server_id, dropped, "MCP session closed");
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.router.abort();
    }
}

#[async_trait]
impl RemoteBridge for McpClient {
    fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Follows `nextCursor` until the listing is complete.
    async fn list_capabilities(&self) -> Result<Vec<RemoteTool>, TrellisError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = serde_json::from_value(self.request("tools/list", params).await?)
                .map_err(|e| TrellisError::RemoteProtocol {
                    message: "malformed tools/list result".to_string(),
                    source: Some(Box::new(e)),
                })?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!(server = %self.server_id, count = tools.len(), "listed remote tools");
        Ok(tools)
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<CallToolResult, TrellisError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(result).map_err(|e| TrellisError::RemoteProtocol {
            message: format!("malformed tools/call result for `{name}`"),
            source: Some(Box::new(e)),
        })
    }
}

/// Reads inbound frames until the transport closes, then fails all waiters.
async fn route_inbound(
    server_id: String,
    mut inbound: Inbound,
    pending: Arc<PendingRequests>,
    transport: Arc<dyn Transport>,
) {
    while let Some(raw) = inbound.recv().await {
        let frame = match serde_json::from_str::<Value>(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(server = %server_id, error = %e, "dropping undecodable frame");
                continue;
            }
        };
        match Incoming::classify(frame) {
            Some(Incoming::Response { id, outcome }) => {
                if !pending.complete(id, outcome) {
                    debug!(server = %server_id, request_id = id, "late or unknown reply discarded");
                }
            }
            Some(Incoming::Request { id, method, .. }) => {
                let reply = if method == "ping" {
                    result_frame(&id, json!({}))
                } else {
                    debug!(server = %server_id, method = %method, "unsupported server request");
                    error_frame(&id, METHOD_NOT_FOUND, &format!("method `{method}` not supported"))
                };
                if let Err(e) = transport.send(reply.to_string()).await {
                    warn!(server = %server_id, error = %e, "failed to answer server request");
                }
            }
            Some(Incoming::Notification { method, .. }) => {
                debug!(server = %server_id, method = %method, "server notification");
            }
            None => warn!(server = %server_id, "dropping frame that is not JSON-RPC"),
        }
    }
    let dropped = pending.close_all();
    info!(server = %server_id, dropped, "MCP server connection ended");
}
