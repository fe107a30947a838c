//! One match and its turn state machine
//!
//! A [`Game`] is a match between exactly two players on a triangular
//! board. Play alternates between selecting a tile and resolving the
//! answer for it; a correct answer claims the tile for the side on turn,
//! a wrong or missing answer hands it to the opponent. Every resolution
//! runs win detection on the freshly claimed tile.
//!
//! Out-of-turn and out-of-state operations are deliberate no-ops: stale
//! concurrent clients routinely send them and the last writer simply
//! loses. The caller observes whether anything changed through the return
//! values, never through errors.

use std::collections::HashMap;

use enum_map::{Enum, EnumMap, enum_map};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    board::{BoardLayout, TileCoord},
    connectivity::is_winning_move,
    question::QuestionCard,
    store::{GameId, PlayerId, RoomCode},
};

/// A side within one specific game
///
/// The tag is per-game: the same player may be side A in one match and
/// side B in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum PlayerRole {
    /// The side that moves first
    A,
    /// The other side
    B,
}

impl PlayerRole {
    /// The opposing side
    pub fn swap(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// State of one tile on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileState {
    /// Unclaimed and selectable
    Default,
    /// Currently selected; its question is being answered
    Selected,
    /// Permanently owned by one side
    Claimed(PlayerRole),
}

impl TileState {
    /// The claimed state for a given side
    pub fn claimed_by(role: PlayerRole) -> Self {
        Self::Claimed(role)
    }
}

/// One cell of the board with its question card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    /// Position on the triangular board
    pub coord: TileCoord,
    /// Current ownership state
    pub state: TileState,
    /// The question gating this tile
    pub card: QuestionCard,
}

/// Errors that can occur when creating a game
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Both sides referenced the same player
    #[error("a game requires two distinct players")]
    IdenticalPlayers,
    /// The question pool cannot fill even a single-row board
    #[error("not enough questions for a board")]
    NotEnoughQuestions,
}

/// What a call to [`Game::resolve_answer`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The action was stale or out of turn; nothing changed
    Ignored,
    /// The selected tile was claimed
    Claimed {
        /// The tile that changed ownership
        coord: TileCoord,
        /// The side that now owns it
        by: PlayerRole,
        /// Whether the claim completed a winning connection
        won: bool,
    },
}

/// A match between two players inside one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    id: GameId,
    room: RoomCode,
    players: EnumMap<PlayerRole, PlayerId>,
    on_turn: PlayerRole,
    is_over: bool,
    layout: BoardLayout,
    /// Tiles dense by linear index, in deal order
    tiles: Vec<Tile>,
}

impl Game {
    /// Creates a game, sizing the board from the question pool
    ///
    /// The board uses the largest full triangle the pool can fill; the
    /// caller is expected to pass an already-shuffled pool and questions
    /// beyond the board size are dropped. Side A is on turn first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdenticalPlayers`] when both sides are the same
    /// player and [`Error::NotEnoughQuestions`] for an empty pool.
    pub fn new(
        id: GameId,
        room: RoomCode,
        player_a: PlayerId,
        player_b: PlayerId,
        cards: Vec<QuestionCard>,
    ) -> Result<Self, Error> {
        if player_a == player_b {
            return Err(Error::IdenticalPlayers);
        }
        let layout = BoardLayout::from_max_tile_count(cards.len());
        if layout.rows == 0 {
            return Err(Error::NotEnoughQuestions);
        }
        let tiles = layout
            .tiles()
            .zip(cards)
            .map(|(coord, card)| Tile {
                coord,
                state: TileState::Default,
                card,
            })
            .collect();
        Ok(Self {
            id,
            room,
            players: enum_map! {
                PlayerRole::A => player_a,
                PlayerRole::B => player_b,
            },
            on_turn: PlayerRole::A,
            is_over: false,
            layout,
            tiles,
        })
    }

    /// The game's unique id
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Code of the room this game belongs to
    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    /// The player occupying a side
    pub fn player(&self, role: PlayerRole) -> PlayerId {
        self.players[role]
    }

    /// The side a player occupies, if they are in this game
    pub fn role_of(&self, player: PlayerId) -> Option<PlayerRole> {
        [PlayerRole::A, PlayerRole::B]
            .into_iter()
            .find(|role| self.players[*role] == player)
    }

    /// The side currently on turn; after a win, the winning side
    pub fn on_turn(&self) -> PlayerRole {
        self.on_turn
    }

    /// Whether the match has been decided
    pub fn is_over(&self) -> bool {
        self.is_over
    }

    /// Geometry of this game's board
    pub fn layout(&self) -> BoardLayout {
        self.layout
    }

    /// All tiles in deal order (dense by linear index)
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The tile at a linear index, if it exists
    pub fn tile(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    /// The currently selected tile, if any
    ///
    /// At most one tile is ever selected; [`Game::select_tile`] refuses a
    /// second selection.
    pub fn selected_tile(&self) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.state == TileState::Selected)
    }

    /// Snapshot of claimed tiles for win detection
    fn claimed_owners(&self) -> HashMap<TileCoord, PlayerRole> {
        self.tiles
            .iter()
            .filter_map(|t| match t.state {
                TileState::Claimed(role) => Some((t.coord, role)),
                _ => None,
            })
            .collect()
    }

    /// Selects a tile for the side on turn
    ///
    /// Valid only while the game is running, `role` is on turn, nothing
    /// else is selected, and the indexed tile exists in `Default` state.
    /// Any other combination leaves the game untouched and returns
    /// `false`.
    pub fn select_tile(&mut self, role: PlayerRole, index: usize) -> bool {
        if self.is_over || role != self.on_turn || self.selected_tile().is_some() {
            return false;
        }
        match self.tiles.get_mut(index) {
            Some(tile) if tile.state == TileState::Default => {
                tile.state = TileState::Selected;
                true
            }
            _ => false,
        }
    }

    /// Resolves the answer for the selected tile
    ///
    /// A correct answer claims the tile for the side on turn; a wrong or
    /// absent answer claims it for the opponent. The freshly claimed tile
    /// is then checked for a winning connection: on a win the game ends
    /// with the claiming side left on turn (so the final view highlights
    /// the winner), otherwise the turn passes to the other side.
    pub fn resolve_answer(&mut self, role: PlayerRole, answer: Option<&str>) -> AnswerOutcome {
        if self.is_over || role != self.on_turn {
            return AnswerOutcome::Ignored;
        }
        let Some(selected) = self
            .tiles
            .iter_mut()
            .find(|t| t.state == TileState::Selected)
        else {
            return AnswerOutcome::Ignored;
        };

        let claiming = if selected.card.matches(answer) {
            role
        } else {
            role.swap()
        };
        selected.state = TileState::claimed_by(claiming);
        let coord = selected.coord;

        let won = is_winning_move(&self.claimed_owners(), self.layout.rows, coord);
        if won {
            self.is_over = true;
            self.on_turn = claiming;
        } else {
            self.on_turn = self.on_turn.swap();
        }

        AnswerOutcome::Claimed {
            coord,
            by: claiming,
            won,
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::board::triangular;

    fn cards(n: usize) -> Vec<QuestionCard> {
        (0..n)
            .map(|i| QuestionCard::new(format!("question {i}"), vec![format!("answer {i}")]).unwrap())
            .collect_vec()
    }

    fn two_players() -> (PlayerId, PlayerId) {
        (PlayerId::new(), PlayerId::new())
    }

    fn new_game(question_count: usize) -> Game {
        let (a, b) = two_players();
        Game::new(GameId::new(), RoomCode::from("1234"), a, b, cards(question_count)).unwrap()
    }

    #[test]
    fn test_new_game_sizes_board_from_pool() {
        let game = new_game(21);
        assert_eq!(game.layout().rows, 6);
        assert_eq!(game.tiles().len(), 21);

        let game = new_game(20);
        assert_eq!(game.layout().rows, 5);
        assert_eq!(game.tiles().len(), triangular(5));
    }

    #[test]
    fn test_new_game_rejects_identical_players() {
        let player = PlayerId::new();
        assert_eq!(
            Game::new(GameId::new(), RoomCode::from("1234"), player, player, cards(3)).unwrap_err(),
            Error::IdenticalPlayers
        );
    }

    #[test]
    fn test_new_game_rejects_empty_pool() {
        let (a, b) = two_players();
        assert_eq!(
            Game::new(GameId::new(), RoomCode::from("1234"), a, b, vec![]).unwrap_err(),
            Error::NotEnoughQuestions
        );
    }

    #[test]
    fn test_select_tile_requires_turn_and_default_state() {
        let mut game = new_game(6);
        assert_eq!(game.on_turn(), PlayerRole::A);

        // B is not on turn.
        assert!(!game.select_tile(PlayerRole::B, 0));
        // Unknown index.
        assert!(!game.select_tile(PlayerRole::A, 99));
        // Valid selection.
        assert!(game.select_tile(PlayerRole::A, 0));
        assert_eq!(game.selected_tile().unwrap().coord, TileCoord::new(0, 0));
        // Second selection while one is pending.
        assert!(!game.select_tile(PlayerRole::A, 1));
    }

    #[test]
    fn test_correct_answer_claims_for_actor_and_swaps_turn() {
        let mut game = new_game(6);
        assert!(game.select_tile(PlayerRole::A, 1));

        let outcome = game.resolve_answer(PlayerRole::A, Some("answer 1"));
        assert_eq!(
            outcome,
            AnswerOutcome::Claimed {
                coord: TileCoord::new(1, 0),
                by: PlayerRole::A,
                won: false,
            }
        );
        assert_eq!(game.tile(1).unwrap().state, TileState::Claimed(PlayerRole::A));
        assert_eq!(game.on_turn(), PlayerRole::B);
        assert!(!game.is_over());
    }

    #[test]
    fn test_wrong_answer_hands_tile_to_opponent() {
        let mut game = new_game(6);
        assert!(game.select_tile(PlayerRole::A, 2));

        let outcome = game.resolve_answer(PlayerRole::A, Some("nonsense"));
        assert_eq!(
            outcome,
            AnswerOutcome::Claimed {
                coord: TileCoord::new(1, 1),
                by: PlayerRole::B,
                won: false,
            }
        );
        assert_eq!(game.tile(2).unwrap().state, TileState::Claimed(PlayerRole::B));
        assert_eq!(game.on_turn(), PlayerRole::B);
    }

    #[test]
    fn test_absent_answer_counts_as_wrong() {
        let mut game = new_game(6);
        assert!(game.select_tile(PlayerRole::A, 0));
        let AnswerOutcome::Claimed { by, .. } = game.resolve_answer(PlayerRole::A, None) else {
            panic!("expected a claim");
        };
        assert_eq!(by, PlayerRole::B);
    }

    #[test]
    fn test_resolve_without_selection_is_ignored() {
        let mut game = new_game(6);
        assert_eq!(
            game.resolve_answer(PlayerRole::A, Some("answer 0")),
            AnswerOutcome::Ignored
        );
    }

    #[test]
    fn test_resolve_out_of_turn_is_ignored() {
        let mut game = new_game(6);
        assert!(game.select_tile(PlayerRole::A, 0));
        assert_eq!(
            game.resolve_answer(PlayerRole::B, Some("answer 0")),
            AnswerOutcome::Ignored
        );
        // The selection survives for the side actually on turn.
        assert!(game.selected_tile().is_some());
    }

    #[test]
    fn test_winning_answer_ends_game_with_winner_on_turn() {
        // Single-tile board: the first claim touches all three edges.
        let mut game = new_game(1);
        assert!(game.select_tile(PlayerRole::A, 0));

        let outcome = game.resolve_answer(PlayerRole::A, Some("answer 0"));
        assert_eq!(
            outcome,
            AnswerOutcome::Claimed {
                coord: TileCoord::new(0, 0),
                by: PlayerRole::A,
                won: true,
            }
        );
        assert!(game.is_over());
        // Winner stays on turn so the final render highlights them.
        assert_eq!(game.on_turn(), PlayerRole::A);
    }

    #[test]
    fn test_wrong_answer_on_single_tile_board_wins_for_opponent() {
        let mut game = new_game(1);
        assert!(game.select_tile(PlayerRole::A, 0));

        let AnswerOutcome::Claimed { by, won, .. } = game.resolve_answer(PlayerRole::A, None)
        else {
            panic!("expected a claim");
        };
        assert_eq!(by, PlayerRole::B);
        assert!(won);
        assert!(game.is_over());
        assert_eq!(game.on_turn(), PlayerRole::B);
    }

    #[test]
    fn test_no_actions_after_game_over() {
        let mut game = new_game(1);
        assert!(game.select_tile(PlayerRole::A, 0));
        game.resolve_answer(PlayerRole::A, Some("answer 0"));
        assert!(game.is_over());

        assert!(!game.select_tile(PlayerRole::A, 0));
        assert_eq!(game.resolve_answer(PlayerRole::A, None), AnswerOutcome::Ignored);
    }

    #[test]
    fn test_roles_alternate_through_a_full_exchange() {
        let mut game = new_game(6);

        assert!(game.select_tile(PlayerRole::A, 0));
        game.resolve_answer(PlayerRole::A, Some("answer 0"));
        assert_eq!(game.on_turn(), PlayerRole::B);

        assert!(game.select_tile(PlayerRole::B, 1));
        game.resolve_answer(PlayerRole::B, Some("answer 1"));
        assert_eq!(game.on_turn(), PlayerRole::A);
    }

    #[test]
    fn test_role_of_maps_both_players() {
        let (a, b) = two_players();
        let game =
            Game::new(GameId::new(), RoomCode::from("1234"), a, b, cards(3)).unwrap();
        assert_eq!(game.role_of(a), Some(PlayerRole::A));
        assert_eq!(game.role_of(b), Some(PlayerRole::B));
        assert_eq!(game.role_of(PlayerId::new()), None);
    }
}
