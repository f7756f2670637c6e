//! # Rules Engine Seam
//!
//! The coordinator never decides board legality itself. It talks to a
//! [`RulesEngine`], a pure function set over an opaque position type: validate
//! and apply a candidate, encode and decode positions, list legal moves and
//! report terminal conditions.
//!
//! Two engines ship with the crate:
//!
//! - [`ChessRules`] - standard chess backed by `shakmaty` (FEN + SAN)
//! - [`TicTacToeRules`] - the 3x3 game, used for the second catalogue entry

pub mod chess;
pub mod tictactoe;

pub use chess::ChessRules;
pub use tictactoe::TicTacToeRules;

use crate::error::RulesError;
use crate::types::Color;
use serde::{Deserialize, Serialize};

/// Kind of a captured piece, used by the AI's material heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// A move the rules engine considers legal in some position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMove {
    /// Canonical notation, including check (`+`) and mate (`#`) suffixes
    pub notation: String,
    /// Origin square, when the game has one
    pub from: Option<String>,
    /// Destination square or cell
    pub to: String,
    /// Kind of piece removed from the board by this move
    pub captured: Option<PieceKind>,
    /// Whether the move leaves the opponent in check
    pub gives_check: bool,
    /// Whether the move ends the game in the mover's favour
    pub gives_mate: bool,
}

/// A move proposed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveCandidate {
    /// Textual notation the engine can parse (`e4`, `Nf3`, `e2e4`, `b2`)
    Notation(String),
    /// A drag from one square to another; `promotion` defaults per engine
    Squares {
        from: String,
        to: String,
        promotion: Option<char>,
    },
}

impl MoveCandidate {
    pub fn notation(text: impl Into<String>) -> Self {
        Self::Notation(text.into())
    }

    pub fn squares(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Squares {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }
}

impl std::fmt::Display for MoveCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notation(text) => f.write_str(text),
            Self::Squares { from, to, promotion } => {
                write!(f, "{from}{to}")?;
                if let Some(p) = promotion {
                    write!(f, "{p}")?;
                }
                Ok(())
            }
        }
    }
}

/// Terminal condition of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    /// The side to move is mated
    Checkmate { winner: Color },
    /// The side to move has no legal move and is not in check
    Stalemate,
    /// Any other drawn ending (insufficient material, fifty-move rule,
    /// threefold repetition, full board)
    Draw,
    /// A non-chess game was won outright
    Win { winner: Color },
}

/// Board legality provider for one turn-based game.
///
/// Implementations are pure: every method derives its answer from its
/// arguments alone, so the coordinator can freely replay moves on copies.
pub trait RulesEngine: Send + Sync + 'static {
    /// Engine-specific position value.
    type Position: Clone + Send + Sync + 'static;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// The position every game starts from.
    fn initial(&self) -> Self::Position;

    /// Compact string that fully describes `position`.
    fn encode(&self, position: &Self::Position) -> String;

    /// Rebuilds a position from its encoding.
    fn decode(&self, encoding: &str) -> Result<Self::Position, RulesError>;

    fn side_to_move(&self, position: &Self::Position) -> Color;

    /// Every legal move; empty when the position is terminal.
    fn legal_moves(&self, position: &Self::Position) -> Vec<LegalMove>;

    /// Validates `candidate` and returns the resulting position and the
    /// canonical notation of the move.
    fn play(
        &self,
        position: &Self::Position,
        candidate: &MoveCandidate,
    ) -> Result<(Self::Position, String), RulesError>;

    /// Outcome decided by the position alone.
    fn outcome(&self, position: &Self::Position) -> Option<Outcome>;

    /// Outcome of the game that reached `position` by playing `history` from
    /// the initial position.
    ///
    /// Engines with history-dependent endings (repetition) override this.
    fn outcome_after(&self, position: &Self::Position, history: &[String]) -> Option<Outcome> {
        let _ = history;
        self.outcome(position)
    }

    /// Applies a move received as notation.
    fn play_notation(
        &self,
        position: &Self::Position,
        notation: &str,
    ) -> Result<(Self::Position, String), RulesError> {
        self.play(position, &MoveCandidate::Notation(notation.to_string()))
    }

    fn initial_encoding(&self) -> String {
        self.encode(&self.initial())
    }

    /// Legal moves starting on `square`, for target highlighting.
    fn legal_moves_from(&self, position: &Self::Position, square: &str) -> Vec<LegalMove> {
        self.legal_moves(position)
            .into_iter()
            .filter(|m| m.from.as_deref() == Some(square))
            .collect()
    }

    /// The single legal move that turns `from` into the position encoded by
    /// `target`, if there is exactly such a move.
    fn connecting_move(&self, from: &Self::Position, target: &str) -> Option<String> {
        self.legal_moves(from).into_iter().find_map(|m| {
            let (next, notation) = self.play_notation(from, &m.notation).ok()?;
            (self.encode(&next) == target).then_some(notation)
        })
    }
}
