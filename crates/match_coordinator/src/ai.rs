//! # AI Opponent
//!
//! A one-ply greedy heuristic: every legal move is scored by the material it
//! captures, with a large bonus for mate and a small one for check, and the
//! first move with the highest score wins.
//!
//! | Captured piece | Value |
//! |----------------|-------|
//! | pawn           | 10    |
//! | knight, bishop | 30    |
//! | rook           | 50    |
//! | queen          | 90    |
//!
//! Mate adds 1000. A non-mating check adds 5.

use rand::Rng;

use crate::rules::{LegalMove, PieceKind};

const MATE_BONUS: i32 = 1000;
const CHECK_BONUS: i32 = 5;

/// Material value of a captured piece.
pub const fn piece_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 10,
        PieceKind::Knight | PieceKind::Bishop => 30,
        PieceKind::Rook => 50,
        PieceKind::Queen => 90,
        PieceKind::King => 0,
    }
}

/// Heuristic score of a single move.
pub fn score(candidate: &LegalMove) -> i32 {
    let mut score = candidate.captured.map(piece_value).unwrap_or(0);
    if candidate.gives_mate {
        score += MATE_BONUS;
    } else if candidate.gives_check {
        score += CHECK_BONUS;
    }
    score
}

/// Picks the AI's reply from a list of legal moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiMoveSelector;

impl AiMoveSelector {
    pub fn new() -> Self {
        Self
    }

    /// Selects a move using the thread-local random generator.
    pub fn select<'a>(&self, legal_moves: &'a [LegalMove]) -> Option<&'a LegalMove> {
        self.select_with(legal_moves, &mut rand::thread_rng())
    }

    /// Selects a move; `None` only when `legal_moves` is empty.
    ///
    /// The random pick only seeds the search. Every score is at least zero,
    /// so the first candidate always replaces it and ties resolve to the
    /// earliest candidate in iteration order.
    pub fn select_with<'a, G>(&self, legal_moves: &'a [LegalMove], rng: &mut G) -> Option<&'a LegalMove>
    where
        G: Rng + ?Sized,
    {
        if legal_moves.is_empty() {
            return None;
        }

        let mut best = &legal_moves[rng.gen_range(0..legal_moves.len())];
        let mut best_score = -1;
        for candidate in legal_moves {
            let candidate_score = score(candidate);
            if candidate_score > best_score {
                best = candidate;
                best_score = candidate_score;
            }
        }
        Some(best)
    }
}
