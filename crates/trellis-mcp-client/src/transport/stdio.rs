// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newline-delimited frames over a child process's stdin and stdout.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trellis_core::TrellisError;

use super::{INBOUND_CAPACITY, Inbound, Transport};

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Pipe transport to a spawned MCP server.
pub struct StdioTransport {
    writer: Mutex<Option<Writer>>,
    child: Mutex<Option<Child>>,
    reader: JoinHandle<()>,
}

impl StdioTransport {
    /// Spawns `command` and links to its stdio.
    ///
    /// `env` entries are added on top of the inherited environment. The
    /// child is killed when the transport is dropped.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<(Self, Inbound), TrellisError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| TrellisError::RemoteProtocol {
            message: format!("failed to spawn `{command}`"),
            source: Some(Box::new(e)),
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrellisError::protocol("child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TrellisError::protocol("child stdout unavailable"))?;
        if let Some(stderr) = child.stderr.take() {
            let command = command.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(command = %command, "server stderr: {line}");
                }
            });
        }
        info!(command = %command, pid = ?child.id(), "spawned MCP server");

        let (mut transport, inbound) = Self::from_streams(stdout, stdin);
        transport.child = Mutex::new(Some(child));
        Ok((transport, inbound))
    }

    /// Links to an already-open pair of streams.
    pub fn from_streams<R, W>(reader: R, writer: W) -> (Self, Inbound)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("server closed stdout");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "reading server stdout failed");
                        break;
                    }
                }
            }
        });
        let transport = Self {
            writer: Mutex::new(Some(Box::new(writer))),
            child: Mutex::new(None),
            reader,
        };
        (transport, rx)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, frame: String) -> Result<(), TrellisError> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| TrellisError::protocol("transport closed"))?;
        let mut line = frame.into_bytes();
        line.push(b'\n');
        let io = async {
            writer.write_all(&line).await?;
            writer.flush().await
        };
        io.await.map_err(|e| TrellisError::RemoteProtocol {
            message: "write to server stdin failed".to_string(),
            source: Some(Box::new(e)),
        })
    }

    async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "server already exited");
            }
        }
        self.reader.abort();
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
