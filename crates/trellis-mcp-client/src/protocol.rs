// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC 2.0 framing and the MCP message shapes the client uses.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_NOT_FOUND: i64 = -32601;

/// Outbound request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Error object of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A frame received from the server, classified by its keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Reply to one of our requests.
    Response {
        id: u64,
        outcome: Result<Value, JsonRpcError>,
    },
    /// Server-initiated request; needs a reply carrying `id` verbatim.
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl Incoming {
    /// Classifies one decoded frame. `None` for anything that is not JSON-RPC.
    pub fn classify(mut frame: Value) -> Option<Self> {
        let map = frame.as_object_mut()?;
        let method = map.remove("method").and_then(|m| m.as_str().map(str::to_string));
        let params = map.remove("params");
        let id = map.remove("id").filter(|id| !id.is_null());

        match (method, id) {
            (Some(method), Some(id)) => Some(Self::Request { id, method, params }),
            (Some(method), None) => Some(Self::Notification { method, params }),
            (None, Some(id)) => {
                let id = id.as_u64()?;
                let outcome = match map.remove("error") {
                    Some(err) => Err(serde_json::from_value(err).unwrap_or_else(|e| JsonRpcError {
                        code: 0,
                        message: format!("malformed error object: {e}"),
                        data: None,
                    })),
                    None => Ok(map.remove("result").unwrap_or(Value::Null)),
                };
                Some(Self::Response { id, outcome })
            }
            (None, None) => None,
        }
    }
}

pub fn result_frame(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result })
}

pub fn error_frame(id: &Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "error": { "code": code, "message": message } })
}

pub fn notification_frame(method: &str, params: Option<Value>) -> Value {
    match params {
        Some(params) => json!({ "jsonrpc": JSONRPC_VERSION, "method": method, "params": params }),
        None => json!({ "jsonrpc": JSONRPC_VERSION, "method": method }),
    }
}

/// Parameters of `initialize`.
pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": { "name": "trellis", "version": env!("CARGO_PKG_VERSION") },
    })
}

/// One remote tool as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<RemoteTool>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "structuredContent", default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text blocks joined by newlines, if there are any.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n"))
    }

    /// `structuredContent` if present, else joined text, else null.
    pub fn into_value(self) -> Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        self.text().map(Value::String).unwrap_or(Value::Null)
    }
}
