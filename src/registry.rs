//! Connection registry and action handling
//!
//! The registry binds players to rooms, tracks how many sockets use each
//! binding, pairs waiting players into games, and applies every inbound
//! action to the store. It owns the store behind one mutex: each mutating
//! operation reads, modifies and writes as a single critical section, so
//! two concurrent tile selections or answer submissions for the same game
//! cannot both succeed — the state-machine no-op checks are the guard,
//! not locks held across I/O.
//!
//! Topic publishes happen after the lock is released, in program order:
//! state is fully updated before any subscriber is told to re-read it.

use std::sync::{Arc, Mutex, MutexGuard};

use rustrict::CensorStr;
use tracing::debug;

use crate::{
    bus::{Topic, TopicEventBus},
    constants::player_name,
    game::{AnswerOutcome, Game, PlayerRole},
    question::QuestionCard,
    store::{ConnectionId, GameId, NotFound, Player, PlayerConnection, PlayerId, RoomCode, Room, Store},
    view::{self, OwnerView, PlayerView},
};

/// The result of binding a player to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// The (possibly reused) connection
    pub connection: ConnectionId,
    /// The (possibly freshly minted) player
    pub player: PlayerId,
}

/// Shared handle over the store and the event bus
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Registry {
    store: Arc<Mutex<Store>>,
    bus: TopicEventBus,
}

impl Registry {
    /// Creates a registry around an empty store
    pub fn new(bus: TopicEventBus) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::new())),
            bus,
        }
    }

    /// The event bus this registry publishes on
    pub fn bus(&self) -> &TopicEventBus {
        &self.bus
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("store lock poisoned")
    }

    fn publish_all(&self, topics: Vec<Topic>) {
        for topic in &topics {
            self.bus.publish(topic);
        }
    }

    /// Registers a room with its materialized question pool
    pub fn create_room(&self, code: RoomCode, owner: impl Into<String>, cards: Vec<QuestionCard>) {
        {
            let mut store = self.lock();
            store.insert_room(Room {
                code: code.clone(),
                owner: owner.into(),
                cards,
            });
        }
        self.publish_all(vec![Topic::Room(code)]);
    }

    /// Deletes a room, cascading to its connections and games
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Room`] for an unknown code.
    pub fn delete_room(&self, code: &RoomCode) -> Result<(), NotFound> {
        let affected = self.lock().delete_room(code)?;
        let mut topics = vec![Topic::Room(code.clone())];
        topics.extend(affected.into_iter().map(Topic::Player));
        self.publish_all(topics);
        Ok(())
    }

    /// Binds a player to a room, minting the player if needed
    ///
    /// An unknown `existing` id is treated as absent (the client may carry
    /// a stale cookie from a wiped server). The connection for the
    /// (player, room) pair is reused when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Room`] for an invalid room code.
    pub fn bind(
        &self,
        room: &RoomCode,
        existing: Option<PlayerId>,
    ) -> Result<Binding, NotFound> {
        let mut store = self.lock();
        if !store.room_exists(room) {
            return Err(NotFound::Room(room.clone()));
        }

        let player = match existing.filter(|id| store.player_exists(*id)) {
            Some(id) => id,
            None => {
                let player = Player {
                    id: PlayerId::new(),
                    name: None,
                };
                let id = player.id;
                store.insert_player(player);
                id
            }
        };

        let connection = match store.connection_for(player, room) {
            Some(pc) => pc.id,
            None => {
                let pc = PlayerConnection {
                    id: ConnectionId::new(),
                    player,
                    room: room.clone(),
                    active_count: 0,
                    game: None,
                };
                let id = pc.id;
                store.insert_connection(pc);
                id
            }
        };

        Ok(Binding { connection, player })
    }

    /// Adjusts the open-socket count of a connection
    ///
    /// Deactivating below zero saturates at zero. Activation of an
    /// eligible connection immediately attempts pairing.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Connection`] for an unknown connection.
    pub fn set_active(&self, connection: ConnectionId, active: bool) -> Result<(), NotFound> {
        let mut topics = Vec::new();
        {
            let mut store = self.lock();
            let pc = store.connection_mut(connection)?;
            if active {
                pc.active_count += 1;
            } else {
                pc.active_count = pc.active_count.saturating_sub(1);
            }
            let room = pc.room.clone();
            let game = pc.game;

            topics.push(Topic::Room(room));
            if let Some(game_id) = game {
                let game = store.game(game_id)?;
                topics.push(Topic::Player(game.player(PlayerRole::A)));
                topics.push(Topic::Player(game.player(PlayerRole::B)));
            } else if active {
                topics.extend(pair_up(&mut store, connection));
            }
        }
        self.publish_all(topics);
        Ok(())
    }

    /// Connections eligible for pairing in a room
    ///
    /// Eligible means: at least one open socket, no attached game, and a
    /// non-empty player name.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Room`] for an unknown code.
    pub fn waiting_connections(&self, room: &RoomCode) -> Result<Vec<ConnectionId>, NotFound> {
        let store = self.lock();
        store.room(room)?;
        Ok(store
            .connections_in_room(room)
            .filter(|pc| view::is_waiting(&store, pc))
            .map(|pc| pc.id)
            .collect())
    }

    /// Attempts to pair a connection with a waiting opponent
    ///
    /// Returns whether a match was formed.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Connection`] for an unknown connection.
    pub fn try_start_game(&self, connection: ConnectionId) -> Result<bool, NotFound> {
        let topics = {
            let mut store = self.lock();
            store.connection(connection)?;
            pair_up(&mut store, connection)
        };
        let paired = !topics.is_empty();
        self.publish_all(topics);
        Ok(paired)
    }

    /// Sets or clears a player's display name
    ///
    /// An empty (or all-whitespace) name clears it. Overlong or
    /// inappropriate names are dropped silently — stale or hostile clients
    /// get no error channel. A freshly named, game-less connection
    /// immediately attempts pairing.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when the connection or its player is gone.
    pub fn set_name(&self, connection: ConnectionId, name: &str) -> Result<(), NotFound> {
        let trimmed = name.trim();
        if trimmed.chars().count() > player_name::MAX_LENGTH {
            debug!(connection = %connection, "ignoring overlong name");
            return Ok(());
        }
        if !trimmed.is_empty() && trimmed.is_inappropriate() {
            debug!(connection = %connection, "ignoring inappropriate name");
            return Ok(());
        }

        let mut topics = Vec::new();
        {
            let mut store = self.lock();
            let pc = store.connection(connection)?;
            let (player_id, room, game) = (pc.player, pc.room.clone(), pc.game);

            let player = store.player_mut(player_id)?;
            player.name = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            };

            topics.push(Topic::Player(player_id));
            topics.push(Topic::Room(room));
            if game.is_none() && !trimmed.is_empty() {
                topics.extend(pair_up(&mut store, connection));
            }
        }
        self.publish_all(topics);
        Ok(())
    }

    /// Owner channel: clears a player's display name
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] for an unknown room or player.
    pub fn reject_name(&self, room: &RoomCode, player: PlayerId) -> Result<(), NotFound> {
        {
            let mut store = self.lock();
            store.room(room)?;
            store.player_mut(player)?.name = None;
        }
        self.publish_all(vec![Topic::Player(player), Topic::Room(room.clone())]);
        Ok(())
    }

    /// Handles a tile click for a connection's game
    ///
    /// Out-of-turn, already-selected and unknown-tile clicks are silent
    /// no-ops; a successful selection notifies both participants.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when the connection or its game is gone.
    pub fn tile_click(&self, connection: ConnectionId, tile: usize) -> Result<(), NotFound> {
        let mut topics = Vec::new();
        {
            let mut store = self.lock();
            let pc = store.connection(connection)?;
            let player = pc.player;
            let Some(game_id) = pc.game else {
                return Ok(());
            };
            let game = store.game_mut(game_id)?;
            let Some(role) = game.role_of(player) else {
                return Ok(());
            };
            if game.select_tile(role, tile) {
                topics.push(Topic::Player(game.player(role)));
                topics.push(Topic::Player(game.player(role.swap())));
            }
        }
        self.publish_all(topics);
        Ok(())
    }

    /// Resolves an answer (or a pass) for the selected tile
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when the connection or its game is gone.
    pub fn submit_answer(
        &self,
        connection: ConnectionId,
        answer: Option<&str>,
    ) -> Result<(), NotFound> {
        let mut topics = Vec::new();
        {
            let mut store = self.lock();
            let pc = store.connection(connection)?;
            let player = pc.player;
            let Some(game_id) = pc.game else {
                return Ok(());
            };
            let game = store.game_mut(game_id)?;
            let Some(role) = game.role_of(player) else {
                return Ok(());
            };
            if let AnswerOutcome::Claimed { won, .. } = game.resolve_answer(role, answer) {
                topics.push(Topic::Player(game.player(role)));
                topics.push(Topic::Player(game.player(role.swap())));
                if won {
                    // The dashboard lists finished games.
                    topics.push(Topic::Room(game.room().clone()));
                }
            }
        }
        self.publish_all(topics);
        Ok(())
    }

    /// Leaves a finished game and re-enters the pairing pool
    ///
    /// While the opponent still has an open socket on the game, only this
    /// player's game reference is cleared so the opponent can exit on
    /// their own terms; once the opponent is gone the game is discarded
    /// entirely.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when the connection is gone.
    pub fn start_new_game(&self, connection: ConnectionId) -> Result<(), NotFound> {
        let mut topics = Vec::new();
        {
            let mut store = self.lock();
            let pc = store.connection(connection)?;
            let player = pc.player;
            let room = pc.room.clone();
            let Some(game_id) = pc.game else {
                return Ok(());
            };
            let Ok(game) = store.game(game_id) else {
                // Dangling reference; just clear it.
                store.connection_mut(connection)?.game = None;
                return Ok(());
            };
            let Some(role) = game.role_of(player) else {
                return Ok(());
            };
            let opponent = game.player(role.swap());

            if store.is_player_active_in_game(opponent, game_id) {
                store.connection_mut(connection)?.game = None;
            } else {
                let attached: Vec<ConnectionId> = store
                    .connections_in_game(game_id)
                    .map(|pc| pc.id)
                    .collect();
                for id in attached {
                    store.connection_mut(id)?.game = None;
                }
                store.remove_game(game_id);
            }

            topics.push(Topic::Player(player));
            topics.push(Topic::Player(opponent));
            topics.push(Topic::Room(room));
            topics.extend(pair_up(&mut store, connection));
        }
        self.publish_all(topics);
        Ok(())
    }

    /// Renders the current view for a player connection
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when the connection no longer resolves.
    pub fn render_player(&self, connection: ConnectionId) -> Result<PlayerView, NotFound> {
        view::player_view(&self.lock(), connection)
    }

    /// Renders the dashboard view for a room owner
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] for an unknown room.
    pub fn render_owner(&self, room: &RoomCode) -> Result<OwnerView, NotFound> {
        view::owner_view(&self.lock(), room)
    }
}

/// Pairs a connection with the first waiting opponent in its room
///
/// Both the initiating connection and the candidate must be in the
/// waiting pool and belong to distinct players. The initiator becomes
/// side A. Returns the topics to publish; empty when no match formed.
fn pair_up(store: &mut Store, connection: ConnectionId) -> Vec<Topic> {
    let Ok(pc) = store.connection(connection) else {
        return Vec::new();
    };
    if !view::is_waiting(store, pc) {
        return Vec::new();
    }
    let (player_a, room) = (pc.player, pc.room.clone());

    // First eligible candidate wins; there is no priority queue.
    let mut found = None;
    for other in store.connections_in_room(&room) {
        if other.id != connection && other.player != player_a && view::is_waiting(store, other) {
            found = Some((other.id, other.player));
            break;
        }
    }
    let Some((candidate, player_b)) = found else {
        return Vec::new();
    };

    let Ok(room_entry) = store.room(&room) else {
        return Vec::new();
    };
    let mut cards = room_entry.cards.clone();
    fastrand::shuffle(&mut cards);

    let Ok(game) = Game::new(GameId::new(), room.clone(), player_a, player_b, cards) else {
        debug!(room = %room, "cannot start a game: question pool too small");
        return Vec::new();
    };
    let game_id = game.id();
    store.insert_game(game);

    for id in [connection, candidate] {
        if let Ok(pc) = store.connection_mut(id) {
            pc.game = Some(game_id);
        }
    }

    vec![
        Topic::Room(room),
        Topic::Player(player_a),
        Topic::Player(player_b),
    ]
}
