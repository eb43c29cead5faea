//! Per-session conversation state.
//!
//! The client holds the history and sends it with each request; the server
//! rebuilds a [`Conversation`] from it, appends the new exchange and hands
//! back fresh [`ExchangeIds`].

use uuid::Uuid;

use crate::models::{ConversationTurn, Role};

/// Append-only turn history.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::user(content));
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::assistant(content));
    }

    /// The last `n` turns, oldest first.
    pub fn recent_window(&self, n: usize) -> &[ConversationTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_role(&self) -> Option<Role> {
        self.turns.last().map(|t| t.role)
    }
}

/// Opaque identifiers for one completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeIds {
    pub conversation_id: String,
    pub message_id: String,
}

impl ExchangeIds {
    pub fn generate() -> Self {
        Self {
            conversation_id: format!("conv_{}", Uuid::new_v4().simple()),
            message_id: format!("msg_{}", Uuid::new_v4().simple()),
        }
    }
}
