//! Defines the realtime event protocol between the chat client and the bot backend.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use crate::turn::Turn;
use serde::{Deserialize, Serialize};

/// Text used for a bot turn when the reply carried no usable text.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response";

/// Payload of the `chat_message` event.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub bot_id: String,
    pub message: String,
    pub conversation_id: String,
}

/// Events sent from the client to the backend.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// A user turn addressed to one bot within one conversation.
    ChatMessage(ChatMessage),
}

impl OutboundEvent {
    /// Serializes the event into a single text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Events received from the backend, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `bot_response`: the bot finished composing a reply.
    BotResponse(BotReply),
    /// `bot_typing`: the bot is composing. Any payload is ignored.
    BotTyping,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize, Default)]
struct RawReply {
    message: Option<String>,
    reply: Option<String>,
    educational_image: Option<String>,
}

impl InboundEvent {
    /// Parses one inbound text frame.
    ///
    /// Returns `Ok(None)` for well-formed frames naming an event this client
    /// does not handle.
    pub fn decode(frame: &str) -> Result<Option<Self>, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        match envelope.event.as_str() {
            "bot_response" => {
                let raw = if envelope.data.is_null() {
                    RawReply::default()
                } else {
                    serde_json::from_value::<RawReply>(envelope.data)?
                };
                Ok(Some(InboundEvent::BotResponse(raw.into())))
            }
            "bot_typing" => Ok(Some(InboundEvent::BotTyping)),
            _ => Ok(None),
        }
    }
}

/// Which field of a `bot_response` payload supplied the reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Message(String),
    Reply(String),
    Empty,
}

/// A `bot_response` payload with the `message`/`reply` ambiguity resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub body: ReplyBody,
    pub educational_image: Option<String>,
}

impl From<RawReply> for BotReply {
    fn from(raw: RawReply) -> Self {
        let non_empty = |field: Option<String>| field.filter(|s| !s.is_empty());
        let body = match (non_empty(raw.message), non_empty(raw.reply)) {
            (Some(text), _) => ReplyBody::Message(text),
            (None, Some(text)) => ReplyBody::Reply(text),
            (None, None) => ReplyBody::Empty,
        };
        Self {
            body,
            educational_image: non_empty(raw.educational_image),
        }
    }
}

impl BotReply {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            body: ReplyBody::Message(text.into()),
            educational_image: None,
        }
    }

    /// The text a bot turn built from this reply will display.
    pub fn text(&self) -> &str {
        match &self.body {
            ReplyBody::Message(text) | ReplyBody::Reply(text) => text,
            ReplyBody::Empty => NO_RESPONSE_PLACEHOLDER,
        }
    }

    /// Builds the transcript entry for this reply.
    pub fn into_turn(self) -> Turn {
        let text = match self.body {
            ReplyBody::Message(text) | ReplyBody::Reply(text) => text,
            ReplyBody::Empty => NO_RESPONSE_PLACEHOLDER.to_string(),
        };
        Turn::bot(text, self.educational_image)
    }
}
