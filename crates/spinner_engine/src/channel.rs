use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use spinner_core::JobId;
use sync_logging::{sync_debug, sync_info, sync_warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One text frame from the server.
    Notification(String),
    /// The connection is gone; no further events follow.
    Closed { reason: Option<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed")]
    Closed,
}

/// A full-duplex text channel to the notification endpoint.
#[async_trait::async_trait]
pub trait NotificationChannel: Send {
    async fn send(&mut self, text: &str) -> Result<(), ChannelError>;

    /// Waits for the next inbound event. Once `Closed` has been returned the
    /// channel keeps returning `Closed`.
    async fn next_event(&mut self) -> ChannelEvent;

    async fn close(&mut self);
}

#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn NotificationChannel>, ChannelError>;
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn NotificationChannel>, ChannelError> {
        let handshake = connect_async(url.as_str());
        let (stream, response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| ChannelError::Timeout(self.connect_timeout))??;
        sync_debug!("Websocket handshake with {} answered {}", url, response.status());
        Ok(Box::new(WsChannel {
            stream,
            closed: false,
        }))
    }
}

pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait::async_trait]
impl NotificationChannel for WsChannel {
    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.stream.send(Message::text(text.to_string())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> ChannelEvent {
        while !self.closed {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return ChannelEvent::Notification(text.as_str().to_string());
                }
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    let reason =
                        frame.map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()));
                    return ChannelEvent::Closed { reason };
                }
                // Binary, ping and pong frames carry nothing for us.
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.closed = true;
                    return ChannelEvent::Closed {
                        reason: Some(err.to_string()),
                    };
                }
                None => self.closed = true,
            }
        }
        ChannelEvent::Closed { reason: None }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(err) = self.stream.close(None).await {
                sync_debug!("Websocket close handshake failed: {}", err);
            }
        }
    }
}

/// Owns the single notification connection of a page.
///
/// Opened once; never reopened. Handlers get it by `&mut` from the engine.
pub struct ConnectionManager {
    endpoint: Url,
    channel: Option<Box<dyn NotificationChannel>>,
}

impl ConnectionManager {
    /// Makes the one connection attempt. A failed attempt yields a manager
    /// that is already closed.
    pub async fn open(endpoint: Url, connector: &dyn Connector) -> Self {
        sync_info!("Connecting to {}", endpoint);
        let channel = match connector.connect(&endpoint).await {
            Ok(channel) => Some(channel),
            Err(err) => {
                sync_warn!("Could not connect to {}: {}", endpoint, err);
                None
            }
        };
        Self { endpoint, channel }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    pub async fn send(&mut self, job: &JobId) {
        let Some(channel) = self.channel.as_mut() else {
            sync_debug!("Dropping announcement of {}: connection closed", job);
            return;
        };
        // A failed send surfaces as a close on the read side.
        if let Err(err) = channel.send(job.as_str()).await {
            sync_warn!("Failed to announce job {}: {}", job, err);
        }
    }

    pub async fn next_event(&mut self) -> ChannelEvent {
        let Some(channel) = self.channel.as_mut() else {
            return ChannelEvent::Closed { reason: None };
        };
        let event = channel.next_event().await;
        if matches!(event, ChannelEvent::Closed { .. }) {
            self.channel = None;
        }
        event
    }

    pub async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
    }
}
