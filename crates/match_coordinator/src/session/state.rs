//! Session state and its transition table.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::rules::{Outcome, RulesEngine};
use crate::types::{Color, MatchId, SessionStatus};

/// Operations the presentation layer may invoke on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    StartLocalGame,
    StartAiGame,
    StartMatchmaking,
    ApplyMove,
    CancelOrExit,
}

impl Operation {
    pub const fn describe(self) -> &'static str {
        match self {
            Self::StartLocalGame => "start a local game",
            Self::StartAiGame => "start an AI game",
            Self::StartMatchmaking => "start matchmaking",
            Self::ApplyMove => "apply a move",
            Self::CancelOrExit => "cancel or exit",
        }
    }

    /// Whether the operation may be invoked from `from` at all.
    ///
    /// Matchmaking from `Waiting` is only a retry after a failed attempt; the
    /// coordinator checks that extra condition itself.
    pub const fn allowed_from(self, from: SessionStatus) -> bool {
        use SessionStatus::*;
        match self {
            Self::StartLocalGame => true,
            Self::StartAiGame => matches!(from, Local),
            Self::StartMatchmaking => matches!(from, Local | Waiting),
            Self::ApplyMove => matches!(from, Local | Playing | Ai),
            Self::CancelOrExit => matches!(from, Waiting | Playing | Ai),
        }
    }

    pub fn check(self, from: SessionStatus) -> Result<(), SessionError> {
        if self.allowed_from(from) {
            Ok(())
        } else {
            Err(SessionError::illegal_transition(from, self.describe()))
        }
    }
}

/// The client-owned session: board replica, move log and seat.
///
/// Any return to `Local` replaces it wholesale.
#[derive(Debug, Clone)]
pub struct LocalSession<P> {
    pub status: SessionStatus,
    pub board: P,
    pub history: Vec<String>,
    pub assigned_color: Option<Color>,
    pub match_id: Option<MatchId>,
}

impl<P: Clone> LocalSession<P> {
    pub fn new(initial: P) -> Self {
        Self::entered(SessionStatus::Local, initial)
    }

    /// A fresh session in `status` at the initial position.
    pub fn entered(status: SessionStatus, initial: P) -> Self {
        Self {
            status,
            board: initial,
            history: Vec::new(),
            assigned_color: None,
            match_id: None,
        }
    }

    /// Number of the next move record, 1-based.
    pub fn next_move_number(&self) -> u32 {
        self.history.len() as u32 + 1
    }

    pub fn snapshot<R>(&self, rules: &R) -> SessionSnapshot
    where
        R: RulesEngine<Position = P>,
    {
        SessionSnapshot {
            status: self.status,
            board_encoding: rules.encode(&self.board),
            move_history: self.history.clone(),
            assigned_color: self.assigned_color,
            match_id: self.match_id,
            side_to_move: rules.side_to_move(&self.board),
            outcome: rules.outcome_after(&self.board, &self.history),
        }
    }
}

/// Read-only view of a session published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub board_encoding: String,
    pub move_history: Vec<String>,
    pub assigned_color: Option<Color>,
    pub match_id: Option<MatchId>,
    pub side_to_move: Color,
    pub outcome: Option<Outcome>,
}

impl SessionSnapshot {
    pub fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Whether the local player may move now.
    pub fn is_my_turn(&self) -> bool {
        match self.status {
            SessionStatus::Local => true,
            SessionStatus::Playing => self.assigned_color == Some(self.side_to_move),
            SessionStatus::Ai => self.side_to_move == Color::White,
            SessionStatus::Waiting | SessionStatus::Ended => false,
        }
    }
}

/// Session view plus the ambient online count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorState {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub online_count: usize,
}
