// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-stream transport: server-sent events down, HTTP POSTs up.
//!
//! The server's first event is `endpoint`, whose data is the URL (relative
//! to the stream URL) that accepts outbound frames. Every later `message`
//! event carries one inbound frame.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trellis_core::TrellisError;
use url::Url;

use super::{INBOUND_CAPACITY, Inbound, Transport};

/// Event-stream transport to a remote MCP server.
pub struct SseTransport {
    http: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
    listener: JoinHandle<()>,
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

fn remote(message: impl Into<String>, e: impl std::error::Error + Send + Sync + 'static) -> TrellisError {
    TrellisError::RemoteProtocol {
        message: message.into(),
        source: Some(Box::new(e)),
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TrellisError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| remote(format!("invalid header name `{name}`"), e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| remote(format!("invalid value for header `{name}`"), e))?;
        map.insert(name, value);
    }
    Ok(map)
}

impl SseTransport {
    /// Opens the event stream and waits up to `timeout` for the `endpoint` event.
    pub async fn connect(
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<(Self, Inbound), TrellisError> {
        let base = Url::parse(url).map_err(|e| remote(format!("invalid event-stream url `{url}`"), e))?;
        let headers = header_map(headers)?;
        let http = reqwest::Client::new();

        let response = http
            .get(base.clone())
            .headers(headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| remote(format!("connecting to {base} failed"), e))?
            .error_for_status()
            .map_err(|e| remote(format!("{base} refused the event stream"), e))?;

        let mut events = Box::pin(response.bytes_stream().eventsource());

        let first = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.event == "endpoint" => return Ok(event.data),
                    Ok(event) => debug!(event = %event.event, "ignoring event before endpoint"),
                    Err(e) => return Err(TrellisError::protocol(format!("event stream error: {e}"))),
                }
            }
            Err(TrellisError::protocol("event stream ended before the endpoint event"))
        })
        .await
        .map_err(|_| TrellisError::RemoteTimeout {
            method: "endpoint".to_string(),
            duration: timeout,
        })??;

        let endpoint = base
            .join(first.trim())
            .map_err(|e| remote(format!("invalid endpoint `{first}`"), e))?;
        info!(stream = %base, endpoint = %endpoint, "event stream connected");

        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let listener = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.event == "message" || event.event.is_empty() => {
                        if tx.send(event.data).await.is_err() {
                            break;
                        }
                    }
                    Ok(event) => debug!(event = %event.event, "ignoring event"),
                    Err(e) => {
                        warn!(error = %e, "event stream failed");
                        break;
                    }
                }
            }
            debug!("event stream closed");
        });

        Ok((
            Self {
                http,
                endpoint,
                headers,
                listener,
            },
            rx,
        ))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&self, frame: String) -> Result<(), TrellisError> {
        if self.listener.is_finished() {
            return Err(TrellisError::protocol("event stream closed"));
        }
        self.http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(frame)
            .send()
            .await
            .map_err(|e| remote(format!("POST to {} failed", self.endpoint), e))?
            .error_for_status()
            .map_err(|e| remote(format!("{} rejected the message", self.endpoint), e))?;
        Ok(())
    }

    async fn close(&self) {
        self.listener.abort();
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
