//! Error types and handling for the match coordinator.
//!
//! This module defines the errors that can cross component boundaries. Only
//! [`SessionError`] ever reaches the presentation layer; store and presence
//! failures are logged and recovered inside the coordinator.

use crate::types::SessionStatus;

/// Failures reported by a rules engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// Position encoding could not be parsed
    #[error("invalid position encoding: {0}")]
    InvalidEncoding(String),

    /// Notation or candidate could not be parsed at all
    #[error("malformed move notation: {0}")]
    MalformedNotation(String),

    /// Candidate parsed but is not legal in the current position
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The position is terminal; no move can be applied
    #[error("game is already over")]
    GameOver,
}

/// Failures reported by the shared store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The referenced record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store rejected or could not complete the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a presence channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    #[error("presence channel closed")]
    Closed,
}

/// Errors surfaced to the caller of a session operation.
///
/// None of these is fatal: a rejected operation leaves the session exactly as
/// it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The rules engine rejected the candidate
    #[error("illegal move attempt: {0}")]
    IllegalMove(#[from] RulesError),

    /// The candidate belongs to the side the local player does not control
    #[error("not your turn")]
    NotYourTurn,

    /// The operation is not valid from the current state
    #[error("cannot {operation} while {from}")]
    IllegalTransition {
        from: SessionStatus,
        operation: &'static str,
    },

    /// The session actor has shut down
    #[error("session stopped")]
    Stopped,
}

impl SessionError {
    pub fn illegal_transition(from: SessionStatus, operation: &'static str) -> Self {
        Self::IllegalTransition { from, operation }
    }
}
