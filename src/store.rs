//! In-memory entity store
//!
//! Rooms, players, player connections and games live in id-keyed maps and
//! reference each other by id only; there are no back-pointers. The store
//! itself is plain data — the [`registry`](crate::registry) wraps it in a
//! single-writer critical section so that every mutating operation reads,
//! modifies and writes as one atomic unit.
//!
//! Id newtypes serialize as their display form so they can travel inside
//! JSON payloads and be used directly as topic keys.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::game::Game;
use crate::question::QuestionCard;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            DeserializeFromStr,
            SerializeDisplay,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::from_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// A player identity, minted lazily on first room join
    PlayerId
);
uuid_id!(
    /// The durable binding of one player to one room
    ConnectionId
);
uuid_id!(
    /// One match between two players
    GameId
);

/// The short joinable code identifying a room
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct RoomCode(String);

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl RoomCode {
    /// The code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A joinable space bound to one question set
///
/// Room creation, ownership checks and quiz CRUD live outside this crate;
/// the store only keeps what play needs: the code, the opaque owner
/// identity and the materialized question pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// The joinable code
    pub code: RoomCode,
    /// Opaque owner identity from the external auth collaborator
    pub owner: String,
    /// The full question pool of the room's quiz
    pub cards: Vec<QuestionCard>,
}

/// An anonymous player identity with an optional display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Unique id, persisted client-side for rejoining
    pub id: PlayerId,
    /// Display name; `None` until chosen or after rejection
    pub name: Option<String>,
}

/// The binding of one player to one room
///
/// Exactly one connection exists per (player, room) pair; rejoining reuses
/// it. `active_count` tracks how many sockets currently use the binding —
/// a count of zero means "not currently viewing" but the binding persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConnection {
    /// Unique id of the binding
    pub id: ConnectionId,
    /// The bound player
    pub player: PlayerId,
    /// The bound room
    pub room: RoomCode,
    /// Number of currently open sockets using this binding
    pub active_count: u32,
    /// The game the player is currently in, if any
    pub game: Option<GameId>,
}

/// A lookup that failed because the entity does not exist
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    /// Unknown room code
    #[error("unknown room code {0}")]
    Room(RoomCode),
    /// Unknown player id
    #[error("unknown player {0}")]
    Player(PlayerId),
    /// Unknown connection id
    #[error("unknown connection {0}")]
    Connection(ConnectionId),
    /// Unknown game id
    #[error("unknown game {0}")]
    Game(GameId),
}

/// Id-keyed arenas for every entity
#[derive(Debug, Default)]
pub struct Store {
    rooms: HashMap<RoomCode, Room>,
    players: HashMap<PlayerId, Player>,
    connections: HashMap<ConnectionId, PlayerConnection>,
    games: HashMap<GameId, Game>,
}

impl Store {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a room
    pub fn insert_room(&mut self, room: Room) {
        self.rooms.insert(room.code.clone(), room);
    }

    /// Looks up a room by code
    pub fn room(&self, code: &RoomCode) -> Result<&Room, NotFound> {
        self.rooms
            .get(code)
            .ok_or_else(|| NotFound::Room(code.clone()))
    }

    /// Whether a room code resolves to a room
    pub fn room_exists(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    /// Deletes a room, cascading to its connections and games
    ///
    /// Returns the players whose connections were removed so the caller
    /// can notify their topics. Player identities themselves survive.
    pub fn delete_room(&mut self, code: &RoomCode) -> Result<Vec<PlayerId>, NotFound> {
        self.rooms
            .remove(code)
            .ok_or_else(|| NotFound::Room(code.clone()))?;
        let mut affected = Vec::new();
        self.connections.retain(|_, pc| {
            if pc.room == *code {
                affected.push(pc.player);
                false
            } else {
                true
            }
        });
        self.games.retain(|_, game| game.room() != code);
        Ok(affected)
    }

    /// Inserts a freshly created player
    pub fn insert_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Looks up a player
    pub fn player(&self, id: PlayerId) -> Result<&Player, NotFound> {
        self.players.get(&id).ok_or(NotFound::Player(id))
    }

    /// Mutable lookup of a player
    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, NotFound> {
        self.players.get_mut(&id).ok_or(NotFound::Player(id))
    }

    /// Whether a player id is known
    pub fn player_exists(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Inserts a player connection
    pub fn insert_connection(&mut self, connection: PlayerConnection) {
        self.connections.insert(connection.id, connection);
    }

    /// Looks up a connection
    pub fn connection(&self, id: ConnectionId) -> Result<&PlayerConnection, NotFound> {
        self.connections.get(&id).ok_or(NotFound::Connection(id))
    }

    /// Mutable lookup of a connection
    pub fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut PlayerConnection, NotFound> {
        self.connections
            .get_mut(&id)
            .ok_or(NotFound::Connection(id))
    }

    /// The existing connection for a (player, room) pair, if any
    pub fn connection_for(&self, player: PlayerId, room: &RoomCode) -> Option<&PlayerConnection> {
        self.connections
            .values()
            .find(|pc| pc.player == player && pc.room == *room)
    }

    /// All connections bound to a room
    pub fn connections_in_room<'a>(
        &'a self,
        room: &'a RoomCode,
    ) -> impl Iterator<Item = &'a PlayerConnection> {
        self.connections.values().filter(move |pc| pc.room == *room)
    }

    /// All connections attached to a game
    pub fn connections_in_game(&self, game: GameId) -> impl Iterator<Item = &PlayerConnection> {
        self.connections
            .values()
            .filter(move |pc| pc.game == Some(game))
    }

    /// Inserts a game
    pub fn insert_game(&mut self, game: Game) {
        self.games.insert(game.id(), game);
    }

    /// Looks up a game
    pub fn game(&self, id: GameId) -> Result<&Game, NotFound> {
        self.games.get(&id).ok_or(NotFound::Game(id))
    }

    /// Mutable lookup of a game
    pub fn game_mut(&mut self, id: GameId) -> Result<&mut Game, NotFound> {
        self.games.get_mut(&id).ok_or(NotFound::Game(id))
    }

    /// Removes a game without touching connections
    pub fn remove_game(&mut self, id: GameId) -> Option<Game> {
        self.games.remove(&id)
    }

    /// All games running in a room
    pub fn games_in_room<'a>(&'a self, room: &'a RoomCode) -> impl Iterator<Item = &'a Game> {
        self.games.values().filter(move |g| g.room() == room)
    }

    /// Whether any socket of `player` is open on their connection to `game`
    pub fn is_player_active_in_game(&self, player: PlayerId, game: GameId) -> bool {
        self.connections
            .values()
            .any(|pc| pc.player == player && pc.game == Some(game) && pc.active_count > 0)
    }
}
