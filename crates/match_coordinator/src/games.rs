//! # Game Catalogue
//!
//! The turn-based games a coordinator can run, selected by the slug the site
//! routes on. [`GameSession`] puts every game behind the same capability set
//! so a host can drive a session without knowing which board it carries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::CoordinatorConfig;
use crate::error::{PresenceError, SessionError};
use crate::presence::PresenceChannel;
use crate::rules::{ChessRules, LegalMove, MoveCandidate, TicTacToeRules};
use crate::session::{CoordinatorState, MatchCoordinator, SessionSnapshot};
use crate::store::MatchStore;
use crate::types::PlayerId;

/// Game identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Chess,
    TicTacToe,
}

impl GameKind {
    pub const ALL: [GameKind; 2] = [GameKind::Chess, GameKind::TicTacToe];

    /// Parses a route slug such as `chess` or `tic-tac-toe`.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug.trim().to_ascii_lowercase().as_str() {
            "chess" => Some(Self::Chess),
            "tictactoe" | "tic-tac-toe" => Some(Self::TicTacToe),
            _ => None,
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::Chess => "chess",
            Self::TicTacToe => "tictactoe",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Chess => "Chess",
            Self::TicTacToe => "Tic Tac Toe",
        }
    }
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// A running session of any catalogued game.
#[derive(Debug)]
pub enum GameSession {
    Chess(MatchCoordinator<ChessRules>),
    TicTacToe(MatchCoordinator<TicTacToeRules>),
}

macro_rules! with_coordinator {
    ($session:expr, $c:ident => $body:expr) => {
        match $session {
            GameSession::Chess($c) => $body,
            GameSession::TicTacToe($c) => $body,
        }
    };
}

impl GameSession {
    pub fn spawn(kind: GameKind, store: Arc<dyn MatchStore>, config: CoordinatorConfig) -> Self {
        match kind {
            GameKind::Chess => Self::Chess(MatchCoordinator::spawn(ChessRules::new(), store, config)),
            GameKind::TicTacToe => {
                Self::TicTacToe(MatchCoordinator::spawn(TicTacToeRules::new(), store, config))
            }
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            Self::Chess(_) => GameKind::Chess,
            Self::TicTacToe(_) => GameKind::TicTacToe,
        }
    }

    pub async fn with_presence(
        self,
        channel: Arc<dyn PresenceChannel>,
        player: Option<&PlayerId>,
    ) -> Result<Self, PresenceError> {
        Ok(match self {
            Self::Chess(c) => Self::Chess(c.with_presence(channel, player).await?),
            Self::TicTacToe(c) => Self::TicTacToe(c.with_presence(channel, player).await?),
        })
    }

    pub async fn start_local_game(&self) -> Result<(), SessionError> {
        with_coordinator!(self, c => c.start_local_game().await)
    }

    pub async fn start_ai_game(&self) -> Result<(), SessionError> {
        with_coordinator!(self, c => c.start_ai_game().await)
    }

    pub async fn start_matchmaking(&self, player: PlayerId) -> Result<(), SessionError> {
        with_coordinator!(self, c => c.start_matchmaking(player).await)
    }

    pub async fn apply_move(&self, candidate: MoveCandidate) -> Result<String, SessionError> {
        with_coordinator!(self, c => c.apply_move(candidate).await)
    }

    pub async fn cancel_or_exit(&self) -> Result<(), SessionError> {
        with_coordinator!(self, c => c.cancel_or_exit().await)
    }

    pub fn state(&self) -> CoordinatorState {
        with_coordinator!(self, c => c.state())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        with_coordinator!(self, c => c.snapshot())
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionSnapshot> {
        with_coordinator!(self, c => c.subscribe_state())
    }

    pub fn legal_moves(&self) -> Vec<LegalMove> {
        with_coordinator!(self, c => c.legal_moves())
    }

    pub fn legal_moves_from(&self, square: &str) -> Vec<LegalMove> {
        with_coordinator!(self, c => c.legal_moves_from(square))
    }

    pub async fn shutdown(self) {
        with_coordinator!(self, c => c.shutdown().await)
    }
}
