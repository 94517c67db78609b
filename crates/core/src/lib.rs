//! Tutorbot Core
//!
//! Transport-agnostic building blocks for chatting with an educational bot:
//! the bot reference, transcript turns, the realtime wire protocol and the
//! per-window conversation state machine.

pub mod bot;
pub mod conversation;
pub mod error;
pub mod protocol;
pub mod turn;

pub use bot::BotRef;
pub use conversation::{Conversation, ConversationId, MessageSink, Phase, SubmitOutcome};
pub use error::SessionError;
pub use protocol::{BotReply, InboundEvent, OutboundEvent, ReplyBody};
pub use turn::{Role, Turn};
