//! Request and response bodies of the backend REST API.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tutorbot_core::{BotRef, bot::string_or_number};

#[derive(Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthResponse {
    /// Absent when the backend does not log the user in straight away.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: serde_json::Value,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Bot {
    #[serde(deserialize_with = "string_or_number")]
    pub bot_id: String,
    pub bot_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub grade: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<Bot> for BotRef {
    fn from(bot: Bot) -> Self {
        BotRef::new(bot.bot_id, bot.bot_name, bot.subject, bot.grade)
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct BotList {
    #[serde(default)]
    pub bots: Vec<Bot>,
}

/// Form fields for `POST /textbooks/upload`, which creates a bot.
#[derive(Debug, Clone, Default)]
pub struct NewBot {
    pub name: String,
    pub subject: String,
    pub grade: String,
    pub description: Option<String>,
    /// Local path of the textbook to upload with the bot.
    pub textbook: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `GET /analytics/`. The analytics block is shown as-is.
#[derive(Deserialize, Debug, Clone)]
pub struct Dashboard {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub analytics: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub recent_bots: Vec<serde_json::Value>,
}
