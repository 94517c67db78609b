//! In-memory connector used by the unit tests.

use crate::{
    session::ConnectionState,
    transport::{Connector, Link},
};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt, channel::mpsc as fmpsc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::{
    sync::{mpsc, watch},
    time::{Duration, timeout},
};

/// The backend's side of one link opened through [`ChannelConnector`].
pub(crate) struct ServerEnd {
    pub inbound: fmpsc::UnboundedSender<Result<String>>,
    pub outbound: fmpsc::UnboundedReceiver<String>,
    pub credential: Option<String>,
}

pub(crate) struct ChannelConnector {
    opens: AtomicUsize,
    refusing: AtomicBool,
    /// `open` waits while this is `false`.
    released: watch::Sender<bool>,
    ends: mpsc::UnboundedSender<ServerEnd>,
}

impl ChannelConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (ends, ends_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            opens: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
            released: watch::channel(true).0,
            ends,
        });
        (connector, ends_rx)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn refuse(&self) {
        self.refusing.store(true, Ordering::SeqCst);
    }

    /// Parks later `open` calls until [`ChannelConnector::release`].
    pub fn hold(&self) {
        self.released.send_replace(false);
    }

    pub fn release(&self) {
        self.released.send_replace(true);
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, credential: Option<SecretString>) -> Result<Link> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut released = self.released.subscribe();
        released.wait_for(|released| *released).await.map(|_| ())?;
        if self.refusing.load(Ordering::SeqCst) {
            bail!("connection refused");
        }

        let (inbound, inbound_rx) = fmpsc::unbounded();
        let (outbound_tx, outbound) = fmpsc::unbounded();
        self.ends
            .send(ServerEnd {
                inbound,
                outbound,
                credential: credential.map(|c| c.expose_secret().to_string()),
            })
            .map_err(|_| anyhow!("test harness dropped"))?;

        Ok(Link {
            sink: Box::pin(outbound_tx.sink_map_err(anyhow::Error::from)),
            stream: Box::pin(inbound_rx),
        })
    }
}

pub(crate) fn push_frame(end: &ServerEnd, frame: serde_json::Value) {
    end.inbound
        .unbounded_send(Ok(frame.to_string()))
        .expect("session reader is gone");
}

pub(crate) async fn next_frame(end: &mut ServerEnd) -> String {
    timeout(Duration::from_secs(2), end.outbound.next())
        .await
        .expect("timed out waiting for outbound frame")
        .expect("session writer is gone")
}

pub(crate) async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    expected: ConnectionState,
) {
    timeout(Duration::from_secs(2), rx.wait_for(|state| *state == expected))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed");
}
