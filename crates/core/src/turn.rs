//! Transcript entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Bot => write!(f, "bot"),
        }
    }
}

/// One entry of a conversation transcript.
///
/// Turns are immutable once built; the fields are only reachable through
/// accessors so a transcript can hand out references without risk of edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_reference: Option<String>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image_reference: None,
        }
    }

    pub fn bot(text: impl Into<String>, image_reference: Option<String>) -> Self {
        Self {
            role: Role::Bot,
            text: text.into(),
            image_reference,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Relative path of an illustration attached to a bot turn, if any.
    pub fn image_reference(&self) -> Option<&str> {
        self.image_reference.as_deref()
    }
}
