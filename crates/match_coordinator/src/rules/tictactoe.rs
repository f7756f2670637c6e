//! Tic-tac-toe rules.
//!
//! Cells are named like chess squares, files `a`-`c` and ranks `1`-`3`.
//! X moves first and plays as [`Color::White`]. The encoding is the nine
//! cells rank by rank from `a1` (`X`, `O` or `.`) followed by `/x` or `/o`
//! for the side to move.

use super::{LegalMove, MoveCandidate, Outcome, RulesEngine};
use crate::error::RulesError;
use crate::types::Color;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TicTacToeRules;

/// A 3x3 board plus the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    cells: [Option<Color>; 9],
    to_move: Color,
}

impl Grid {
    fn winner(&self) -> Option<Color> {
        LINES.iter().find_map(|[a, b, c]| match (self.cells[*a], self.cells[*b], self.cells[*c]) {
            (Some(x), Some(y), Some(z)) if x == y && y == z => Some(x),
            _ => None,
        })
    }

    fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}

fn cell_name(index: usize) -> String {
    let file = (b'a' + (index % 3) as u8) as char;
    let rank = index / 3 + 1;
    format!("{file}{rank}")
}

fn cell_index(name: &str) -> Option<usize> {
    let bytes = name.trim().as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].to_ascii_lowercase().checked_sub(b'a')?;
    let rank = bytes[1].checked_sub(b'1')?;
    (file < 3 && rank < 3).then_some(rank as usize * 3 + file as usize)
}

impl TicTacToeRules {
    pub fn new() -> Self {
        Self
    }
}

impl RulesEngine for TicTacToeRules {
    type Position = Grid;

    fn name(&self) -> &'static str {
        "tictactoe"
    }

    fn initial(&self) -> Grid {
        Grid {
            cells: [None; 9],
            to_move: Color::White,
        }
    }

    fn encode(&self, position: &Grid) -> String {
        let mut out: String = position
            .cells
            .iter()
            .map(|cell| match cell {
                Some(Color::White) => 'X',
                Some(Color::Black) => 'O',
                None => '.',
            })
            .collect();
        out.push_str(match position.to_move {
            Color::White => "/x",
            Color::Black => "/o",
        });
        out
    }

    fn decode(&self, encoding: &str) -> Result<Grid, RulesError> {
        let invalid = || RulesError::InvalidEncoding(encoding.to_string());
        let (board, side) = encoding.split_once('/').ok_or_else(invalid)?;
        if board.chars().count() != 9 {
            return Err(invalid());
        }

        let mut cells = [None; 9];
        for (cell, ch) in cells.iter_mut().zip(board.chars()) {
            *cell = match ch {
                'X' | 'x' => Some(Color::White),
                'O' | 'o' => Some(Color::Black),
                '.' => None,
                _ => return Err(invalid()),
            };
        }
        let to_move = match side {
            "x" | "X" => Color::White,
            "o" | "O" => Color::Black,
            _ => return Err(invalid()),
        };
        Ok(Grid { cells, to_move })
    }

    fn side_to_move(&self, position: &Grid) -> Color {
        position.to_move
    }

    fn legal_moves(&self, position: &Grid) -> Vec<LegalMove> {
        if self.outcome(position).is_some() {
            return Vec::new();
        }

        (0..9)
            .filter(|&i| position.cells[i].is_none())
            .map(|i| {
                let mut next = *position;
                next.cells[i] = Some(position.to_move);
                LegalMove {
                    notation: cell_name(i),
                    from: None,
                    to: cell_name(i),
                    captured: None,
                    gives_check: false,
                    gives_mate: next.winner().is_some(),
                }
            })
            .collect()
    }

    fn play(&self, position: &Grid, candidate: &MoveCandidate) -> Result<(Grid, String), RulesError> {
        if self.outcome(position).is_some() {
            return Err(RulesError::GameOver);
        }

        let target = match candidate {
            MoveCandidate::Notation(text) => text.as_str(),
            MoveCandidate::Squares { to, .. } => to.as_str(),
        };
        let index =
            cell_index(target).ok_or_else(|| RulesError::MalformedNotation(target.to_string()))?;
        if position.cells[index].is_some() {
            return Err(RulesError::IllegalMove(cell_name(index)));
        }

        let mut next = *position;
        next.cells[index] = Some(position.to_move);
        next.to_move = position.to_move.opposite();
        Ok((next, cell_name(index)))
    }

    fn outcome(&self, position: &Grid) -> Option<Outcome> {
        match position.winner() {
            Some(winner) => Some(Outcome::Win { winner }),
            None if position.is_full() => Some(Outcome::Draw),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_names_round_trip_through_indices() {
        assert_eq!(cell_index("a1"), Some(0));
        assert_eq!(cell_index("c3"), Some(8));
        assert_eq!(cell_index("B2"), Some(4));
        assert_eq!(cell_index("d1"), None);
        assert_eq!(cell_index("a4"), None);
        assert_eq!(cell_name(5), "c2");
    }

    #[test]
    fn test_play_alternates_sides_and_rejects_taken_cells() {
        let rules = TicTacToeRules::new();
        let (pos, notation) = rules.play_notation(&rules.initial(), "b2").unwrap();
        assert_eq!(notation, "b2");
        assert_eq!(rules.side_to_move(&pos), Color::Black);
        assert_eq!(rules.encode(&pos), "....X..../o");
        assert!(matches!(
            rules.play_notation(&pos, "b2"),
            Err(RulesError::IllegalMove(_))
        ));
    }

    #[test]
    fn test_winning_line_ends_game() {
        let rules = TicTacToeRules::new();
        let pos = rules.decode("XX.OO..../x").unwrap();

        let winning = rules
            .legal_moves(&pos)
            .into_iter()
            .find(|m| m.gives_mate)
            .unwrap();
        assert_eq!(winning.notation, "c1");

        let (after, _) = rules.play_notation(&pos, "c1").unwrap();
        assert_eq!(rules.outcome(&after), Some(Outcome::Win { winner: Color::White }));
        assert_eq!(rules.play_notation(&after, "c3"), Err(RulesError::GameOver));
    }

    #[test]
    fn test_full_board_is_a_draw() {
        let rules = TicTacToeRules::new();
        let pos = rules.decode("XOXXOOOXX/o").unwrap();
        assert_eq!(rules.outcome(&pos), Some(Outcome::Draw));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let rules = TicTacToeRules::new();
        assert!(rules.decode("XO/x").is_err());
        assert!(rules.decode("XXXXXXXXZ/x").is_err());
        assert!(rules.decode(".........").is_err());
    }
}
