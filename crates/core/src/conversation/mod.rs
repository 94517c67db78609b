//! Conversation State Machine
//!
//! One [`Conversation`] backs one open chat window. It owns the ordered
//! transcript and the composing flag, applies inbound bot events to them, and
//! hands user turns to a [`MessageSink`] for transmission.

use crate::{
    bot::BotRef,
    error::SessionError,
    protocol::{BotReply, InboundEvent},
    turn::Turn,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(test)]
mod proptests;

/// Opaque key naming one chat session; sent with every outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Creates a fresh id from the current time plus a random suffix, so two
    /// windows opened within the same millisecond still differ.
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "conv_{}_{}",
            Utc::now().timestamp_millis(),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can transmit a user turn to the bot backend.
///
/// Implemented by the realtime session manager; a send must either enqueue the
/// whole message or fail without side effects.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink {
    fn send_chat_message(
        &self,
        bot_id: &str,
        message: &str,
        conversation_id: &ConversationId,
    ) -> Result<(), SessionError>;
}

/// Whether a bot reply is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingReply,
}

/// Result of [`Conversation::submit_user_turn`] when no transport error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The turn was appended and handed to the sink.
    Sent,
    /// A reply is still outstanding; nothing happened.
    Busy,
    /// The input was blank after trimming; nothing happened.
    EmptyInput,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    bot: BotRef,
    id: ConversationId,
    transcript: Vec<Turn>,
    phase: Phase,
}

impl Conversation {
    /// Starts a conversation with a freshly generated id.
    pub fn new(bot: BotRef) -> Self {
        Self::with_id(bot, ConversationId::generate())
    }

    /// Starts a conversation under a caller-chosen id.
    ///
    /// The transcript is seeded with a greeting from the bot.
    pub fn with_id(bot: BotRef, id: ConversationId) -> Self {
        let greeting = Turn::bot(
            format!("Hi! I'm {}. Ask me anything!", bot.bot_name),
            None,
        );
        Self {
            bot,
            id,
            transcript: vec![greeting],
            phase: Phase::Idle,
        }
    }

    pub fn bot(&self) -> &BotRef {
        &self.bot
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Turns in arrival order, oldest first.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_composing(&self) -> bool {
        self.phase == Phase::AwaitingReply
    }

    /// Appends a user turn and transmits it.
    ///
    /// Blank input and input submitted while a reply is outstanding are
    /// ignored. If the sink fails, the user turn stays in the transcript and
    /// the conversation remains idle.
    pub fn submit_user_turn(
        &mut self,
        text: &str,
        sink: &dyn MessageSink,
    ) -> Result<SubmitOutcome, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SubmitOutcome::EmptyInput);
        }
        if self.phase == Phase::AwaitingReply {
            debug!(conversation_id = %self.id, "Reply outstanding, ignoring submit");
            return Ok(SubmitOutcome::Busy);
        }

        self.transcript.push(Turn::user(text));
        if let Err(e) = sink.send_chat_message(&self.bot.bot_id, text, &self.id) {
            warn!(conversation_id = %self.id, error = %e, "Failed to send user turn");
            return Err(e);
        }

        self.phase = Phase::AwaitingReply;
        info!(conversation_id = %self.id, bot_id = %self.bot.bot_id, "User turn sent");
        Ok(SubmitOutcome::Sent)
    }

    /// The backend reported that the bot is composing.
    pub fn on_typing(&mut self) {
        self.phase = Phase::AwaitingReply;
    }

    /// Appends the bot turn built from `reply` and returns to idle.
    pub fn on_reply(&mut self, reply: BotReply) -> &Turn {
        let index = self.transcript.len();
        self.transcript.push(reply.into_turn());
        self.phase = Phase::Idle;
        &self.transcript[index]
    }

    /// Applies any inbound event.
    pub fn apply(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::BotTyping => self.on_typing(),
            InboundEvent::BotResponse(reply) => {
                self.on_reply(reply);
            }
        }
    }
}
