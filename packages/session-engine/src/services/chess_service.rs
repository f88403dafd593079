use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece, Square};
use std::str::FromStr;

#[cfg(test)]
use mockall::automock;

use crate::models::game_session::Color;
use crate::services::errors::chess_service_errors::RulesError;

/// Outcome of applying a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub position: String,
    /// Coordinate notation, e.g. `e2e4` or `e7e8q`.
    pub notation: String,
}

/// Chess rules consumed as a black box over serialized positions.
#[cfg_attr(test, automock)]
pub trait RulesEngine: Send + Sync {
    fn apply_move(
        &self,
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> Result<AppliedMove, RulesError>;

    fn is_terminal(&self, position: &str) -> Result<bool, RulesError>;

    fn is_draw(&self, position: &str) -> Result<bool, RulesError>;

    fn is_checkmate(&self, position: &str) -> Result<bool, RulesError>;

    fn turn_of(&self, position: &str) -> Result<Color, RulesError>;
}

/// FEN-based rules backed by the `chess` crate.
#[derive(Clone, Default)]
pub struct ChessRules;

impl ChessRules {
    pub fn new() -> Self {
        ChessRules
    }

    fn board(position: &str) -> Result<Board, RulesError> {
        Board::from_str(position).map_err(|e| RulesError::InvalidPosition(format!("{}", e)))
    }

    fn square(value: &str) -> Result<Square, RulesError> {
        Square::from_str(&value.to_ascii_lowercase())
            .map_err(|_| RulesError::InvalidSquare(value.to_string()))
    }

    fn promotion_piece(piece: char) -> Result<Piece, RulesError> {
        match piece.to_ascii_lowercase() {
            'q' => Ok(Piece::Queen),
            'r' => Ok(Piece::Rook),
            'b' => Ok(Piece::Bishop),
            'n' => Ok(Piece::Knight),
            _ => Err(RulesError::InvalidPromotion(piece)),
        }
    }

    /// King against king, or king and a single minor piece against king.
    fn insufficient_material(board: &Board) -> bool {
        match board.combined().popcnt() {
            2 => true,
            3 => {
                let minors = *board.pieces(Piece::Bishop) | *board.pieces(Piece::Knight);
                minors.popcnt() == 1
            }
            _ => false,
        }
    }
}

impl RulesEngine for ChessRules {
    fn apply_move(
        &self,
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> Result<AppliedMove, RulesError> {
        let board = Self::board(position)?;
        let from_sq = Self::square(from)?;
        let to_sq = Self::square(to)?;
        let promotion = promotion.map(Self::promotion_piece).transpose()?;

        let chess_move = ChessMove::new(from_sq, to_sq, promotion);
        if !MoveGen::new_legal(&board).any(|legal| legal == chess_move) {
            return Err(RulesError::IllegalMove(chess_move.to_string()));
        }

        let next = board.make_move_new(chess_move);
        Ok(AppliedMove {
            position: format!("{}", next),
            notation: chess_move.to_string(),
        })
    }

    fn is_terminal(&self, position: &str) -> Result<bool, RulesError> {
        let board = Self::board(position)?;
        Ok(board.status() != BoardStatus::Ongoing || Self::insufficient_material(&board))
    }

    fn is_draw(&self, position: &str) -> Result<bool, RulesError> {
        let board = Self::board(position)?;
        Ok(board.status() == BoardStatus::Stalemate || Self::insufficient_material(&board))
    }

    fn is_checkmate(&self, position: &str) -> Result<bool, RulesError> {
        Ok(Self::board(position)?.status() == BoardStatus::Checkmate)
    }

    fn turn_of(&self, position: &str) -> Result<Color, RulesError> {
        Ok(match Self::board(position)?.side_to_move() {
            chess::Color::White => Color::White,
            chess::Color::Black => Color::Black,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game_session::STARTING_POSITION;

    const STALEMATE: &str = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";
    const BARE_KINGS: &str = "8/8/8/4k3/8/8/8/4K3 w - - 0 1";
    const KING_AND_KNIGHT: &str = "8/8/8/4k3/8/8/8/4KN2 w - - 0 1";
    const PROMOTION: &str = "8/P7/8/8/8/8/8/k6K w - - 0 1";

    fn play(moves: &[(&str, &str)]) -> String {
        let rules = ChessRules::new();
        moves
            .iter()
            .fold(STARTING_POSITION.to_string(), |position, (from, to)| {
                rules.apply_move(&position, from, to, None).unwrap().position
            })
    }

    #[test]
    fn test_starting_position_is_white_to_move() {
        let rules = ChessRules::new();
        assert_eq!(rules.turn_of(STARTING_POSITION).unwrap(), Color::White);
        assert!(!rules.is_terminal(STARTING_POSITION).unwrap());
    }

    #[test]
    fn test_legal_move_switches_turn() {
        let rules = ChessRules::new();
        let applied = rules.apply_move(STARTING_POSITION, "e2", "e4", None).unwrap();

        assert_eq!(applied.notation, "e2e4");
        assert_eq!(rules.turn_of(&applied.position).unwrap(), Color::Black);
    }

    #[test]
    fn test_illegal_move_is_rejected() {
        let rules = ChessRules::new();
        let result = rules.apply_move(STARTING_POSITION, "e2", "e5", None);

        assert_eq!(result, Err(RulesError::IllegalMove("e2e5".to_string())));
    }

    #[test]
    fn test_invalid_square_is_rejected() {
        let rules = ChessRules::new();
        let result = rules.apply_move(STARTING_POSITION, "z9", "e4", None);

        assert_eq!(result, Err(RulesError::InvalidSquare("z9".to_string())));
    }

    #[test]
    fn test_invalid_position_is_rejected() {
        let rules = ChessRules::new();
        assert!(matches!(
            rules.turn_of("not a position"),
            Err(RulesError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_fools_mate_is_checkmate_for_black() {
        let rules = ChessRules::new();
        let position = play(&[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);

        assert!(rules.is_checkmate(&position).unwrap());
        assert!(rules.is_terminal(&position).unwrap());
        assert!(!rules.is_draw(&position).unwrap());
        assert_eq!(rules.turn_of(&position).unwrap(), Color::White);
    }

    #[test]
    fn test_stalemate_is_a_draw() {
        let rules = ChessRules::new();
        assert!(rules.is_draw(STALEMATE).unwrap());
        assert!(rules.is_terminal(STALEMATE).unwrap());
        assert!(!rules.is_checkmate(STALEMATE).unwrap());
    }

    #[test]
    fn test_insufficient_material_is_a_draw() {
        let rules = ChessRules::new();
        assert!(rules.is_draw(BARE_KINGS).unwrap());
        assert!(rules.is_draw(KING_AND_KNIGHT).unwrap());
        assert!(!rules.is_draw(STARTING_POSITION).unwrap());
    }

    #[test]
    fn test_promotion_requires_a_piece() {
        let rules = ChessRules::new();

        assert!(matches!(
            rules.apply_move(PROMOTION, "a7", "a8", None),
            Err(RulesError::IllegalMove(_))
        ));
        assert_eq!(
            rules.apply_move(PROMOTION, "a7", "a8", Some('x')),
            Err(RulesError::InvalidPromotion('x'))
        );

        let applied = rules.apply_move(PROMOTION, "a7", "a8", Some('q')).unwrap();
        assert_eq!(applied.notation, "a7a8q");
    }
}
