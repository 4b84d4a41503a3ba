use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::map_view::MapEvent;
use crate::state_vectors::{StateVectorResponse, StateVectorsRequest};

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the last `event:` field, if any
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// Untyped events and `message` events carry snapshots
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("") | Some("message"))
    }
}

/// Incremental `text/event-stream` parser.
///
/// Accepts LF, CRLF and CR line endings, including a CRLF split across two
/// chunks. Multiple `data:` lines of one event are joined with `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    after_cr: bool,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of the body, returning every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut events);
                }
                b'\n' => self.end_line(&mut events),
                _ => self.line.push(byte),
            }
        }

        events
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        // Comment, used by the relay for keep-alives
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Subscribes to a relay's `/states/all` stream and forwards snapshots
pub struct RelaySubscriber {
    client: Client,
    url: String,
    query: Vec<(&'static str, String)>,
}

impl RelaySubscriber {
    pub fn new(client: Client, relay_url: &str, request: &StateVectorsRequest) -> Self {
        Self {
            client,
            url: format!("{}/states/all", relay_url.trim_end_matches('/')),
            query: request.to_query(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Forward every event payload as a [`MapEvent::Snapshot`] until the
    /// stream fails, `cancel` fires, or the receiver is dropped.
    ///
    /// A payload that does not decode is forwarded as `Snapshot(None)`. Any
    /// transport failure, including the relay closing the stream, is
    /// forwarded once as [`MapEvent::StreamError`] and returned as an error.
    pub async fn run(
        &self,
        events: mpsc::Sender<MapEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!("Subscribing to {}", self.url);

        let response = match self
            .client
            .get(&self.url)
            .query(&self.query)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let message = format!("Failed to connect to relay: {}", e);
                return Err(Self::fail(&events, message).await);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Relay returned {}: {}", status, body);
            return Err(Self::fail(&events, message).await);
        }

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Relay subscription cancelled");
                    return Ok(());
                }
                chunk = body.next() => chunk,
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    let message = format!("Relay stream failed: {}", e);
                    return Err(Self::fail(&events, message).await);
                }
                None => {
                    return Err(Self::fail(&events, "Relay closed the stream".to_string()).await);
                }
            };

            for event in decoder.feed(&bytes) {
                if !event.is_message() {
                    debug!("Ignoring {:?} event", event.event);
                    continue;
                }

                let snapshot = match StateVectorResponse::from_json(&event.data) {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        warn!("Undecodable snapshot payload: {:#}", e);
                        None
                    }
                };

                if events.send(MapEvent::Snapshot(snapshot)).await.is_err() {
                    debug!("Map view stopped listening");
                    return Ok(());
                }
            }
        }
    }

    async fn fail(events: &mpsc::Sender<MapEvent>, message: String) -> anyhow::Error {
        warn!("{}", message);
        let _ = events.send(MapEvent::StreamError(message.clone())).await;
        anyhow!(message)
    }
}

/// Connect to `relay_url` and run a [`RelaySubscriber`] to completion
pub async fn subscribe(
    client: Client,
    relay_url: &str,
    request: &StateVectorsRequest,
    events: mpsc::Sender<MapEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    RelaySubscriber::new(client, relay_url, request)
        .run(events, cancel)
        .await
        .context("Relay subscription ended")
}
