//! Transports that carry realtime text frames to and from the backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt, future};
use secrecy::{ExposeSecret, SecretString};
use std::pin::Pin;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::info;

/// Outbound half of a link: accepts whole text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = anyhow::Error> + Send>>;
/// Inbound half of a link: yields whole text frames until the peer goes away.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An established, bidirectional frame channel.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens links to the backend's realtime channel.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a new link, presenting `credential` as the bearer token.
    ///
    /// Rejected credentials and network failures are both reported as errors.
    async fn open(&self, credential: Option<SecretString>) -> Result<Link>;
}

/// A `Connector` speaking JSON text frames over a WebSocket.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, credential: Option<SecretString>) -> Result<Link> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = credential {
            request.headers_mut().insert(
                "Authorization",
                format!("Bearer {}", token.expose_secret()).parse()?,
            );
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .with_context(|| format!("Failed to connect to realtime endpoint {}", self.url))?;
        info!(url = %self.url, "Realtime WebSocket established.");
        let (ws_tx, ws_rx) = ws_stream.split();

        let sink = ws_tx
            .with(|frame: String| {
                future::ready(Ok::<_, tungstenite::Error>(WsMessage::Text(frame.into())))
            })
            .sink_map_err(anyhow::Error::from);

        let stream = ws_rx
            .take_while(|msg| future::ready(!matches!(msg, Ok(WsMessage::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(anyhow::Error::from(e))),
                })
            });

        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
