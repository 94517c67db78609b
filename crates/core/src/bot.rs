//! The bot a conversation is held with.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifies the counterpart of a conversation.
///
/// Owned by the UI layer and handed to a [`crate::Conversation`] when a chat
/// window opens; it never changes for the lifetime of that window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRef {
    #[serde(deserialize_with = "string_or_number")]
    pub bot_id: String,
    pub bot_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub grade: String,
}

impl BotRef {
    pub fn new(
        bot_id: impl Into<String>,
        bot_name: impl Into<String>,
        subject: impl Into<String>,
        grade: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            bot_name: bot_name.into(),
            subject: subject.into(),
            grade: grade.into(),
        }
    }
}

/// Accepts either a JSON string or a JSON number and yields its text form.
///
/// The backend is not consistent about whether ids and grades are quoted.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(text) => text,
        Loose::Int(n) => n.to_string(),
        Loose::Float(n) => n.to_string(),
    })
}
