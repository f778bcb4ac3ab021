//! Conversation context for a single session
//!
//! Holds the chronological (role, text) turns sent along with each command.
//! The context is bounded by a maximum number of turns; when it overflows,
//! the oldest exchange (user turn plus assistant turn) is dropped so the
//! context always begins with a user turn.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Convert to string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, append-only conversation history
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationContext {
    /// Create an empty context holding at most `max_turns` turns
    ///
    /// The bound is raised to 2 so at least one exchange fits.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(2),
        }
    }

    /// Append one completed exchange, evicting the oldest if over the bound
    pub fn push_exchange(&mut self, command: impl Into<String>, reply: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, command));
        self.turns.push(Turn::new(Role::Assistant, reply));

        while self.turns.len() > self.max_turns {
            let evict = self.turns.len().min(2);
            self.turns.drain(..evict);
            tracing::trace!(remaining = self.turns.len(), "evicted oldest exchange");
        }
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turns, at most `n`, starting on a user turn
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Turn] {
        let mut start = self.turns.len().saturating_sub(n);
        while self
            .turns
            .get(start)
            .is_some_and(|t| t.role != Role::User)
        {
            start += 1;
        }
        &self.turns[start..]
    }

    /// Number of turns held
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of turns kept
    #[must_use]
    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Drop all turns
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
