use std::fmt;

use time::OffsetDateTime;

/// Who produced a turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// The person at the terminal (or the envelope built for them).
    User,
    /// The model.
    Assistant,
    /// Leading context such as the system prompt.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One message in the conversation history.
///
/// Turns are immutable once created; history only ever grows by appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
    timestamp: OffsetDateTime,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Creates an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Creates a system turn.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// The turn's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The turn's text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the turn was created.
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }
}
