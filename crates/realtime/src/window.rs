//! A chat window: one conversation attached to the shared session.

use crate::session::SessionManager;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tutorbot_core::{
    BotRef, BotReply, Conversation, ConversationId, SessionError, SubmitOutcome, Turn,
};

/// What changed in the window after an inbound event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowUpdate {
    /// The bot is composing a reply.
    Composing,
    /// A bot turn was appended to the transcript.
    Reply(Turn),
}

enum WindowEvent {
    Reply(BotReply),
    Typing,
}

/// Owns a [`Conversation`] and the observers feeding it.
///
/// Closing (or dropping) the window detaches all observers from the session
/// but leaves the shared connection open.
///
/// Detaching is session-wide, so at most one window should be live at a time.
/// Close the previous window before opening the next one: reassigning with
/// `window = ChatWindow::open(..).await` drops the old window only after the
/// new one has attached, which leaves the new window deaf.
pub struct ChatWindow {
    session: Arc<SessionManager>,
    conversation: Conversation,
    events: mpsc::UnboundedReceiver<WindowEvent>,
    detached: bool,
}

impl ChatWindow {
    pub async fn open(session: Arc<SessionManager>, bot: BotRef) -> Self {
        Self::open_with_id(session, bot, ConversationId::generate()).await
    }

    pub async fn open_with_id(
        session: Arc<SessionManager>,
        bot: BotRef,
        id: ConversationId,
    ) -> Self {
        session.connect().await;

        let (tx, events) = mpsc::unbounded_channel();
        let reply_tx = tx.clone();
        session.on_message(move |reply: &BotReply| {
            let _ = reply_tx.send(WindowEvent::Reply(reply.clone()));
        });
        session.on_typing(move || {
            let _ = tx.send(WindowEvent::Typing);
        });

        let conversation = Conversation::with_id(bot, id);
        info!(
            conversation_id = %conversation.id(),
            bot_id = %conversation.bot().bot_id,
            "Chat window opened."
        );
        Self {
            session,
            conversation,
            events,
            detached: false,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Submits user input through the shared session.
    pub fn submit(&mut self, text: &str) -> Result<SubmitOutcome, SessionError> {
        self.conversation
            .submit_user_turn(text, self.session.as_ref())
    }

    /// Waits for the next inbound event and applies it to the conversation.
    ///
    /// Returns `None` once the window has been detached.
    pub async fn next_update(&mut self) -> Option<WindowUpdate> {
        let event = self.events.recv().await?;
        Some(match event {
            WindowEvent::Typing => {
                self.conversation.on_typing();
                WindowUpdate::Composing
            }
            WindowEvent::Reply(reply) => {
                WindowUpdate::Reply(self.conversation.on_reply(reply).clone())
            }
        })
    }

    pub fn close(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        self.session.remove_all_listeners();
        info!(conversation_id = %self.conversation.id(), "Chat window closed.");
    }
}

impl Drop for ChatWindow {
    fn drop(&mut self) {
        self.detach();
    }
}
