// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal MCP server over stdio, used by tests and demos.
//!
//! Tools: `echo`, `slow_echo` (replies after `delay_ms`, so concurrent calls
//! finish out of order), `add` (structured result), and `fail` (always an
//! error result). `tools/list` pages two tools at a time.

use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

const PAGE_SIZE: usize = 2;

fn tools() -> Vec<Value> {
    let text = json!({
        "type": "object",
        "properties": {"text": {"type": "string", "description": "Text to return"}},
        "required": ["text"]
    });
    vec![
        json!({"name": "echo", "description": "Returns its input", "inputSchema": text}),
        json!({
            "name": "slow_echo",
            "description": "Returns its input after a delay",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "delay_ms": {"type": "integer", "minimum": 0, "maximum": 10000, "default": 200}
                },
                "required": ["text"]
            }
        }),
        json!({
            "name": "add",
            "description": "Adds two numbers",
            "inputSchema": {
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }
        }),
        json!({"name": "fail", "inputSchema": {"type": "object", "properties": {}}}),
    ]
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({"content": [{"type": "text", "text": text}], "isError": is_error})
}

fn list_page(params: Option<&Value>) -> Value {
    let start = params
        .and_then(|p| p.get("cursor"))
        .and_then(Value::as_str)
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0);
    let all = tools();
    let end = (start + PAGE_SIZE).min(all.len());
    let page: Vec<Value> = all.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
    if end < all.len() {
        json!({"tools": page, "nextCursor": end.to_string()})
    } else {
        json!({"tools": page})
    }
}

async fn call_tool(params: Option<Value>) -> Result<Value, (i64, String)> {
    let params = params.unwrap_or(Value::Null);
    let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
    let args = params.get("arguments").cloned().unwrap_or(Value::Null);
    let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
    match name {
        "echo" => Ok(text_result(text, false)),
        "slow_echo" => {
            let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(200);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(text_result(text, false))
        }
        "add" => {
            let a = args.get("a").and_then(Value::as_f64).unwrap_or_default();
            let b = args.get("b").and_then(Value::as_f64).unwrap_or_default();
            let sum = a + b;
            Ok(json!({
                "content": [{"type": "text", "text": sum.to_string()}],
                "structuredContent": {"sum": sum}
            }))
        }
        "fail" => Ok(text_result("requested failure", true)),
        other => Err((-32602, format!("unknown tool `{other}`"))),
    }
}

async fn handle(frame: Value, out: mpsc::UnboundedSender<Value>) {
    let Some(method) = frame.get("method").and_then(Value::as_str) else {
        return;
    };
    let Some(id) = frame.get("id").cloned() else {
        return;
    };
    let params = frame.get("params").cloned();
    let outcome = match method {
        "initialize" => Ok(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "trellis-echo-server", "version": env!("CARGO_PKG_VERSION")}
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(list_page(params.as_ref())),
        "tools/call" => call_tool(params).await,
        other => Err((-32601, format!("method `{other}` not found"))),
    };
    let reply = match outcome {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err((code, message)) => {
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
        }
    };
    let _ = out.send(reply);
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(frame) = rx.recv().await {
            let mut line = frame.to_string().into_bytes();
            line.push(b'\n');
            if stdout.write_all(&line).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match serde_json::from_str::<Value>(&line) {
            Ok(frame) => {
                tokio::spawn(handle(frame, tx.clone()));
            }
            Err(e) => eprintln!("trellis-echo-server: undecodable frame: {e}"),
        }
    }
    drop(tx);
    let _ = writer.await;
    Ok(())
}
