//! Chess rules backed by shakmaty.
//!
//! Positions are encoded as FEN, moves are reported in SAN with check and
//! mate suffixes. Candidates are accepted as SAN, as UCI, or as a from/to
//! square pair; a pawn reaching the last rank without an explicit promotion
//! piece becomes a queen.
//!
//! Draws cover stalemate, insufficient material and the fifty-move rule from
//! the position, and threefold repetition from the game history.

use shakmaty::{
    fen::Fen, san::{San, SanPlus}, uci::UciMove, CastlingMode, Chess, EnPassantMode, Move, Position,
    Role,
};

use super::{LegalMove, MoveCandidate, Outcome, PieceKind, RulesEngine};
use crate::error::RulesError;
use crate::types::Color;

const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Standard chess.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

impl ChessRules {
    pub fn new() -> Self {
        Self
    }

    fn resolve(&self, position: &Chess, candidate: &MoveCandidate) -> Result<Move, RulesError> {
        match candidate {
            MoveCandidate::Notation(text) => resolve_notation(position, text.trim()),
            MoveCandidate::Squares { from, to, promotion } => {
                resolve_squares(position, from, to, *promotion)
            }
        }
    }
}

fn resolve_notation(position: &Chess, text: &str) -> Result<Move, RulesError> {
    let uci_parsed = match text.parse::<UciMove>() {
        Ok(uci) => match uci.to_move(position) {
            Ok(m) => return Ok(m),
            Err(_) => true,
        },
        Err(_) => false,
    };

    match text.parse::<SanPlus>() {
        Ok(san) => san
            .san
            .to_move(position)
            .map_err(|_| RulesError::IllegalMove(text.to_string())),
        Err(_) if uci_parsed => Err(RulesError::IllegalMove(text.to_string())),
        Err(_) => Err(RulesError::MalformedNotation(text.to_string())),
    }
}

fn resolve_squares(
    position: &Chess,
    from: &str,
    to: &str,
    promotion: Option<char>,
) -> Result<Move, RulesError> {
    let base = format!("{}{}", from.trim(), to.trim()).to_ascii_lowercase();
    let attempt = |text: &str| -> Result<Move, RulesError> {
        let uci: UciMove = text
            .parse()
            .map_err(|_| RulesError::MalformedNotation(text.to_string()))?;
        uci.to_move(position)
            .map_err(|_| RulesError::IllegalMove(text.to_string()))
    };

    match promotion {
        Some(piece) => attempt(&format!("{base}{}", piece.to_ascii_lowercase())),
        None => match attempt(&base) {
            Err(RulesError::IllegalMove(_)) => {
                attempt(&format!("{base}q")).map_err(|_| RulesError::IllegalMove(base.clone()))
            }
            other => other,
        },
    }
}

fn san_with_suffix(before: &Chess, m: &Move, after: &Chess) -> String {
    let mut san = San::from_move(before, m).to_string();
    if after.is_checkmate() {
        san.push('#');
    } else if after.is_check() {
        san.push('+');
    }
    san
}

/// FEN without the move counters: two positions with the same key are the
/// same position for repetition purposes.
fn repetition_key(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal)
        .to_string()
        .split(' ')
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

fn piece_kind(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

fn color(c: shakmaty::Color) -> Color {
    match c {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

impl RulesEngine for ChessRules {
    type Position = Chess;

    fn name(&self) -> &'static str {
        "chess"
    }

    fn initial(&self) -> Chess {
        Chess::default()
    }

    fn encode(&self, position: &Chess) -> String {
        Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
    }

    fn decode(&self, encoding: &str) -> Result<Chess, RulesError> {
        let fen: Fen = encoding
            .parse()
            .map_err(|e| RulesError::InvalidEncoding(format!("{e}")))?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidEncoding(format!("{e}")))
    }

    fn side_to_move(&self, position: &Chess) -> Color {
        color(position.turn())
    }

    fn legal_moves(&self, position: &Chess) -> Vec<LegalMove> {
        if self.outcome(position).is_some() {
            return Vec::new();
        }

        position
            .legal_moves()
            .iter()
            .map(|m| {
                let mut after = position.clone();
                after.play_unchecked(m);
                let uci = UciMove::from_move(m, CastlingMode::Standard).to_string();
                LegalMove {
                    notation: san_with_suffix(position, m, &after),
                    from: uci.get(0..2).map(str::to_string),
                    to: uci.get(2..4).unwrap_or_default().to_string(),
                    captured: m.capture().map(piece_kind),
                    gives_check: after.is_check(),
                    gives_mate: after.is_checkmate(),
                }
            })
            .collect()
    }

    fn play(&self, position: &Chess, candidate: &MoveCandidate) -> Result<(Chess, String), RulesError> {
        if self.outcome(position).is_some() {
            return Err(RulesError::GameOver);
        }

        let m = self.resolve(position, candidate)?;
        let after = position
            .clone()
            .play(&m)
            .map_err(|_| RulesError::IllegalMove(candidate.to_string()))?;
        let notation = san_with_suffix(position, &m, &after);
        Ok((after, notation))
    }

    fn outcome(&self, position: &Chess) -> Option<Outcome> {
        if position.is_checkmate() {
            Some(Outcome::Checkmate {
                winner: color(position.turn()).opposite(),
            })
        } else if position.is_stalemate() {
            Some(Outcome::Stalemate)
        } else if position.is_insufficient_material() || position.halfmoves() >= FIFTY_MOVE_HALFMOVES {
            Some(Outcome::Draw)
        } else {
            None
        }
    }

    fn outcome_after(&self, position: &Chess, history: &[String]) -> Option<Outcome> {
        if let Some(outcome) = self.outcome(position) {
            return Some(outcome);
        }

        let target = repetition_key(position);
        let mut replay = self.initial();
        let mut seen = usize::from(repetition_key(&replay) == target);
        for notation in history {
            let m = resolve_notation(&replay, notation).ok()?;
            replay = replay.play(&m).ok()?;
            if repetition_key(&replay) == target {
                seen += 1;
            }
        }

        // A history that does not lead here says nothing about repetition.
        if self.encode(&replay) != self.encode(position) {
            return None;
        }
        (seen >= 3).then_some(Outcome::Draw)
    }
}
