//! In-memory conversation session
//!
//! Holds the message history, the turn state and the diagnostic slots
//! (last retrieved context, last error) for one continuous interaction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, ErrorKind};

/// Turn state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Ready for a new turn
    #[default]
    Idle,
    /// Waiting for a transcript
    Listening,
    /// Retrieving, generating and synthesizing
    Processing,
    /// Reply audio is playing
    Speaking,
    /// Last turn failed; requires an explicit stop
    Error,
}

impl SessionState {
    /// Whether a turn is in flight
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Listening | Self::Processing | Self::Speaking)
    }

    /// Whether `self -> next` is an edge of the turn state machine
    ///
    /// Forced returns to idle (stop) are always allowed.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (_, Self::Idle)
            | (Self::Idle, Self::Listening)
            | (Self::Listening, Self::Processing)
            | (Self::Processing, Self::Speaking) => true,
            (from, Self::Error) => from.is_active(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Assistant placeholder awaiting its final content
    pub pending: bool,
}

impl ChatMessage {
    /// Create a finished user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), false)
    }

    /// Create a finished assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), false)
    }

    /// Create an in-flight assistant placeholder
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, String::new(), true)
    }

    fn new(role: Role, content: String, pending: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            created_at: Utc::now(),
            pending,
        }
    }
}

/// Error recorded on the session for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    /// Short user-facing message
    pub message: String,
    /// Technical detail, only for diagnostic views
    pub detail: String,
}

impl From<&Error> for SessionError {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.user_message().to_string(),
            detail: e.to_string(),
        }
    }
}

/// Conversation state for one continuous interaction
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationSession {
    messages: Vec<ChatMessage>,
    state: SessionState,
    last_context: Option<String>,
    last_error: Option<SessionError>,
}

impl ConversationSession {
    /// Create an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session seeded with an assistant greeting
    #[must_use]
    pub fn with_welcome(welcome: Option<&str>) -> Self {
        let mut session = Self::new();
        session.seed_welcome(welcome);
        session
    }

    fn seed_welcome(&mut self, welcome: Option<&str>) {
        if let Some(text) = welcome.map(str::trim).filter(|t| !t.is_empty()) {
            self.messages.push(ChatMessage::assistant(text));
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`, returning false if the edge is not allowed
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition(next) {
            tracing::warn!(from = %self.state, to = %next, "rejected state transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "session state");
        self.state = next;
        true
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Finished messages, most recent `window` only
    #[must_use]
    pub fn history(&self, window: usize) -> Vec<ChatMessage> {
        let finished: Vec<&ChatMessage> = self.messages.iter().filter(|m| !m.pending).collect();
        let skip = finished.len().saturating_sub(window);
        finished.into_iter().skip(skip).cloned().collect()
    }

    /// Append a user message, returning its id
    pub fn push_user(&mut self, content: &str) -> Uuid {
        let message = ChatMessage::user(content);
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Append an assistant placeholder, returning its id
    pub fn push_placeholder(&mut self) -> Uuid {
        let message = ChatMessage::placeholder();
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Replace a pending placeholder with its final content, keeping the id
    pub fn resolve_placeholder(&mut self, id: Uuid, content: &str) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id && m.pending) else {
            return false;
        };
        message.content = content.to_string();
        message.created_at = Utc::now();
        message.pending = false;
        true
    }

    /// Remove any pending placeholder
    pub fn discard_pending(&mut self) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !m.pending);
        before - self.messages.len()
    }

    #[must_use]
    pub fn last_context(&self) -> Option<&str> {
        self.last_context.as_deref()
    }

    pub fn set_last_context(&mut self, context: Option<String>) {
        self.last_context = context;
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// Record a failure and enter the error state
    pub fn fail(&mut self, error: &Error) {
        self.last_error = Some(SessionError::from(error));
        self.transition(SessionState::Error);
    }

    /// Force the idle state and clear the error slot
    pub fn reset(&mut self) {
        self.discard_pending();
        self.last_error = None;
        self.transition(SessionState::Idle);
    }

    /// Drop all messages and diagnostics, re-seeding the greeting
    pub fn clear(&mut self, welcome: Option<&str>) {
        self.messages.clear();
        self.last_context = None;
        self.last_error = None;
        self.seed_welcome(welcome);
    }
}
