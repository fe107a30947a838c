//! Wire types: inbound actions and fully-rendered outbound views
//!
//! Every push to a socket is a complete view of current state — there is
//! no diffing protocol. Render functions read the store snapshot and
//! build the view a player session or an owner dashboard needs.
//!
//! Inbound frames are a tagged union; see [`Action`]. Unknown tags fail
//! deserialization and are dropped by the session with a log line.

use enum_map::EnumMap;
use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{answer_text, player_name},
    game::{Game, PlayerRole, TileState},
    store::{ConnectionId, NotFound, PlayerId, RoomCode, Store},
};

/// A client action decoded from one socket text frame
///
/// The `action` tag selects the variant; field names match the wire
/// contract. Validation bounds are checked before dispatch and a failing
/// payload is ignored like any other malformed frame.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Set or clear the acting player's display name
    SetName {
        /// The requested name; empty clears it
        #[garde(length(chars, max = player_name::MAX_LENGTH))]
        player_name: String,
    },
    /// Select a board tile by linear index
    TileClick {
        /// Dense tile index as rendered in the view
        #[garde(skip)]
        tile: usize,
    },
    /// Submit a text answer for the selected tile
    SubmitAnswer {
        /// The answer text
        #[garde(length(chars, max = answer_text::MAX_LENGTH))]
        answer: String,
    },
    /// Give up on the selected tile (counts as a wrong answer)
    NoAnswer,
    /// Leave the finished game or request a rematch pairing
    StartNewGame,
    /// Owner channel: clear a player's display name
    RejectName {
        /// The player whose name is rejected
        #[garde(skip)]
        player_id: PlayerId,
    },
}

/// One tile as rendered to clients
#[derive(Debug, Clone, Serialize)]
pub struct TileView {
    /// Dense linear index, used in tile-click actions
    pub index: usize,
    /// Row on the triangular board
    pub row: usize,
    /// Column within the row
    pub col: usize,
    /// Pixel x of the tile center
    pub x: f64,
    /// Pixel y of the tile center
    pub y: f64,
    /// Ownership state
    pub state: TileState,
}

/// A running match as rendered to one participant
#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    /// SVG view box framing the board
    pub view_box: String,
    /// Every tile with its position and state
    pub tiles: Vec<TileView>,
    /// The side this view belongs to
    pub you: PlayerRole,
    /// The side on turn; after a win, the winner
    pub on_turn: PlayerRole,
    /// Whether the match is decided
    pub is_over: bool,
    /// Display names of both sides
    pub names: EnumMap<PlayerRole, Option<String>>,
    /// Question text of the selected tile, if one is selected
    pub question: Option<String>,
}

/// The complete view pushed to a player session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PlayerView {
    /// The player has not chosen a name yet
    NamePrompt {
        /// The player's id, persisted client-side for rejoining
        player_id: PlayerId,
    },
    /// Named but not paired into a game yet
    Waiting {
        /// The chosen display name
        player_name: String,
        /// The joined room
        room_code: RoomCode,
    },
    /// In a running or finished game
    Game(GameView),
    /// A collaborator failure during render; connection stays open
    Error {
        /// Human-readable description
        message: String,
    },
}

/// One player row on the owner dashboard
#[derive(Debug, Clone, Serialize)]
pub struct RoomPlayer {
    /// The player's id (target of reject-name actions)
    pub id: PlayerId,
    /// Display name, if chosen
    pub name: Option<String>,
    /// Whether any of their sockets is currently open
    pub active: bool,
}

/// One running match on the owner dashboard
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    /// Display names of both sides
    pub names: EnumMap<PlayerRole, Option<String>>,
    /// Whether the match is decided
    pub is_over: bool,
}

/// The complete view pushed to an owner dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum OwnerView {
    /// Current room state
    Room {
        /// The room's code
        room_code: RoomCode,
        /// Every player bound to the room
        players: Vec<RoomPlayer>,
        /// Matches in progress or finished
        games: Vec<GameSummary>,
        /// Connections eligible for pairing
        waiting: Vec<RoomPlayer>,
    },
    /// A collaborator failure during render; connection stays open
    Error {
        /// Human-readable description
        message: String,
    },
}

impl PlayerView {
    /// Serializes the view into one socket text frame
    ///
    /// # Panics
    ///
    /// Panics if serialization fails, which cannot happen for these
    /// well-formed types.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

impl OwnerView {
    /// Serializes the view into one socket text frame
    ///
    /// # Panics
    ///
    /// Panics if serialization fails, which cannot happen for these
    /// well-formed types.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Display names of a game's two sides
fn game_names(store: &Store, game: &Game) -> EnumMap<PlayerRole, Option<String>> {
    EnumMap::from_fn(|role| {
        store
            .player(game.player(role))
            .ok()
            .and_then(|p| p.name.clone())
    })
}

/// Builds the game view for one side
fn game_view(store: &Store, game: &Game, you: PlayerRole) -> GameView {
    let tiles = game
        .tiles()
        .iter()
        .map(|tile| {
            let (x, y) = tile.coord.center();
            TileView {
                index: tile.coord.index(),
                row: tile.coord.row,
                col: tile.coord.col,
                x,
                y,
                state: tile.state,
            }
        })
        .collect();

    GameView {
        view_box: game.layout().view_box(),
        tiles,
        you,
        on_turn: game.on_turn(),
        is_over: game.is_over(),
        names: game_names(store, game),
        question: game.selected_tile().map(|t| t.card.text().to_owned()),
    }
}

/// Renders the current view for a player connection
///
/// # Errors
///
/// Returns [`NotFound`] when the connection or an entity it references no
/// longer exists (e.g. its room was deleted mid-session).
pub fn player_view(store: &Store, connection: ConnectionId) -> Result<PlayerView, NotFound> {
    let pc = store.connection(connection)?;
    let player = store.player(pc.player)?;

    let Some(name) = player.name.clone().filter(|n| !n.is_empty()) else {
        return Ok(PlayerView::NamePrompt { player_id: player.id });
    };

    if let Some(game_id) = pc.game {
        let game = store.game(game_id)?;
        let you = game.role_of(player.id).unwrap_or(PlayerRole::A);
        return Ok(PlayerView::Game(game_view(store, game, you)));
    }

    Ok(PlayerView::Waiting {
        player_name: name,
        room_code: pc.room.clone(),
    })
}

/// Whether a connection sits in the pairing pool
pub(crate) fn is_waiting(store: &Store, pc: &crate::store::PlayerConnection) -> bool {
    pc.active_count > 0
        && pc.game.is_none()
        && store
            .player(pc.player)
            .ok()
            .and_then(|p| p.name.as_deref())
            .is_some_and(|n| !n.is_empty())
}

/// Renders the dashboard view for a room owner
///
/// # Errors
///
/// Returns [`NotFound`] when the room does not exist.
pub fn owner_view(store: &Store, room: &RoomCode) -> Result<OwnerView, NotFound> {
    store.room(room)?;

    let mut players: Vec<RoomPlayer> = Vec::new();
    let mut waiting: Vec<RoomPlayer> = Vec::new();
    for pc in store.connections_in_room(room) {
        let Ok(player) = store.player(pc.player) else {
            continue;
        };
        let row = RoomPlayer {
            id: player.id,
            name: player.name.clone(),
            active: pc.active_count > 0,
        };
        if is_waiting(store, pc) {
            waiting.push(row.clone());
        }
        players.push(row);
    }
    // Stable dashboard ordering regardless of map iteration order.
    let players = players.into_iter().sorted_by_key(|p| p.id).collect();
    let waiting = waiting.into_iter().sorted_by_key(|p| p.id).collect();

    let games = store
        .games_in_room(room)
        .map(|game| GameSummary {
            names: game_names(store, game),
            is_over: game.is_over(),
        })
        .collect();

    Ok(OwnerView::Room {
        room_code: room.clone(),
        players,
        games,
        waiting,
    })
}
