//! Session Manager
//!
//! Keeps zero or one realtime connection per client and acts as the event bus
//! between that connection and any number of observers. Constructed once by
//! the application root and shared (`Arc`) with every chat window.

use crate::transport::{Connector, Link};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};
use tutorbot_core::{
    BotReply, ConversationId, InboundEvent, MessageSink, OutboundEvent, SessionError,
    protocol::ChatMessage,
};

/// Lifecycle of the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Supplies the bearer credential presented when a connection is opened.
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<SecretString>;
}

/// A credential fixed at construction time.
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> Option<SecretString> {
        self.0.clone().map(SecretString::from)
    }
}

type ReplyHandler = Arc<dyn Fn(&BotReply) + Send + Sync>;
type TypingHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Observers {
    replies: Vec<ReplyHandler>,
    typing: Vec<TypingHandler>,
}

struct ActiveLink {
    outbound: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ActiveLink {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

pub struct SessionManager {
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialSource>,
    state: Arc<watch::Sender<ConnectionState>>,
    observers: Arc<Mutex<Observers>>,
    active: Mutex<Option<ActiveLink>>,
    /// Bumped on every connect attempt and every disconnect. Tasks and pending
    /// connects only touch shared state while their generation is current.
    generation: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, credentials: Arc<dyn CredentialSource>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            credentials,
            state: Arc::new(state),
            observers: Arc::new(Mutex::new(Observers::default())),
            active: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watches connection state changes, including transport drops.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Opens the shared connection unless one is already up or being opened.
    ///
    /// Failures are not returned as errors; they leave the state at
    /// `Disconnected`, which is also what this returns.
    #[instrument(name = "realtime_connect", skip_all)]
    pub async fn connect(&self) -> ConnectionState {
        let claimed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            let current = self.state();
            debug!(state = ?current, "Already connected");
            return current;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let credential = self.credentials.bearer_token();
        if credential.is_none() {
            warn!("Connecting without a bearer credential.");
        }

        match self.connector.open(credential).await {
            Ok(link) => self.attach(link, generation),
            Err(e) => {
                warn!(error = ?e, "Realtime connection failed.");
                if self.generation.load(Ordering::SeqCst) == generation {
                    self.state.send_replace(ConnectionState::Disconnected);
                }
                self.state()
            }
        }
    }

    fn attach(&self, link: Link, generation: u64) -> ConnectionState {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            // Disconnected (or reconnected) while this link was being opened.
            debug!("Discarding link opened for a superseded connect.");
            return self.state();
        }
        if let Some(stale) = active.take() {
            stale.abort();
        }

        // Published before the reader starts so an immediately closed stream
        // still ends in `Disconnected`.
        self.state.send_replace(ConnectionState::Connected);

        let Link {
            mut sink,
            mut stream,
        } = link;
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let observers = self.observers.clone();
        let state = self.state.clone();
        let current = self.generation.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(text) => dispatch(&observers, &text),
                    Err(e) => {
                        warn!(error = ?e, "Realtime transport error.");
                        break;
                    }
                }
            }
            if current.load(Ordering::SeqCst) == generation {
                state.send_replace(ConnectionState::Disconnected);
                info!("Realtime connection dropped.");
            }
        });

        // A failed write ends the whole link, not just the outbound half.
        let reader_handle = reader.abort_handle();
        let state = self.state.clone();
        let current = self.generation.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(frame).await {
                    warn!(error = ?e, "Failed to write outbound frame.");
                    reader_handle.abort();
                    if current.load(Ordering::SeqCst) == generation {
                        state.send_replace(ConnectionState::Disconnected);
                        info!("Realtime connection dropped.");
                    }
                    return;
                }
            }
            let _ = sink.close().await;
        });

        *active = Some(ActiveLink {
            outbound,
            reader,
            writer,
        });
        info!("Realtime session connected.");
        ConnectionState::Connected
    }

    /// Tears down the active connection. A later `connect` builds a new one.
    pub fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let link = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match link {
            Some(link) => {
                link.abort();
                info!("Realtime session closed.");
            }
            None => debug!("Disconnect requested with no active connection."),
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Enqueues one `chat_message` event. Does not wait for any reply.
    pub fn send(
        &self,
        bot_id: &str,
        message: &str,
        conversation_id: &ConversationId,
    ) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        let frame = OutboundEvent::ChatMessage(ChatMessage {
            bot_id: bot_id.to_string(),
            message: message.to_string(),
            conversation_id: conversation_id.to_string(),
        })
        .encode()?;

        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let link = active.as_ref().ok_or(SessionError::NotConnected)?;
        link.outbound
            .send(frame)
            .map_err(|_| SessionError::NotConnected)?;
        debug!(bot_id, %conversation_id, "Queued chat message.");
        Ok(())
    }

    /// Registers an observer for `bot_response` events.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&BotReply) + Send + Sync + 'static,
    {
        self.lock_observers().replies.push(Arc::new(handler));
    }

    /// Registers an observer for `bot_typing` events.
    pub fn on_typing<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.lock_observers().typing.push(Arc::new(handler));
    }

    /// Detaches every observer. The connection itself is left alone.
    pub fn remove_all_listeners(&self) {
        let mut observers = self.lock_observers();
        let removed = observers.replies.len() + observers.typing.len();
        *observers = Observers::default();
        debug!(removed, "Removed realtime observers.");
    }

    fn lock_observers(&self) -> std::sync::MutexGuard<'_, Observers> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageSink for SessionManager {
    fn send_chat_message(
        &self,
        bot_id: &str,
        message: &str,
        conversation_id: &ConversationId,
    ) -> Result<(), SessionError> {
        self.send(bot_id, message, conversation_id)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(link) = active.take() {
            link.abort();
        }
    }
}

/// Decodes one inbound frame and calls the matching observers in
/// registration order.
fn dispatch(observers: &Mutex<Observers>, frame: &str) {
    let event = match InboundEvent::decode(frame) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!(frame, "Ignoring unhandled realtime event.");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Dropping malformed realtime frame.");
            return;
        }
    };

    // Handlers run outside the lock so they may register or remove observers.
    match event {
        InboundEvent::BotResponse(reply) => {
            let handlers = observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .replies
                .clone();
            debug!(observers = handlers.len(), "Dispatching bot response.");
            for handler in handlers {
                handler(&reply);
            }
        }
        InboundEvent::BotTyping => {
            let handlers = observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .typing
                .clone();
            for handler in handlers {
                handler();
            }
        }
    }
}
