//! Socket session dispatch
//!
//! A session is one open socket: a player screen or an owner dashboard.
//! The embedding server owns the actual websocket; it hands this module a
//! [`Tunnel`] for outbound frames and a channel of inbound text frames,
//! and [`run_session`] does the rest: subscribe to the topics the role
//! cares about, push a full view on every change, and apply inbound
//! actions through the registry.
//!
//! Change notification is coalesced. The bus listener only flips a
//! [`Notify`] permit; however many publishes land while the session is
//! busy, the next loop iteration renders once against current state.
//! Subscriptions are released on every exit path.

use std::sync::Arc;

use garde::Validate;
use tokio::sync::{mpsc::UnboundedReceiver, Notify};
use tracing::{debug, warn};

use crate::{
    bus::Topic,
    registry::Registry,
    store::{ConnectionId, NotFound, PlayerId, RoomCode},
    view::{Action, OwnerView, PlayerView},
};

/// Outbound half of a socket, implemented by the embedding server
pub trait Tunnel: Send + Sync {
    /// Pushes one text frame to the client
    fn send(&self, message: &str);

    /// Closes the socket
    fn close(&self);
}

/// What distinguishes a player session from an owner session
///
/// The dispatch loop is identical for both; the role decides which topics
/// to watch, how to render, and which actions it accepts.
pub trait SessionRole: Send {
    /// Topics whose publishes should trigger a re-render
    fn topics(&self) -> Vec<Topic>;

    /// Runs once before the first render
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when the session's subject no longer exists;
    /// the session is then refused.
    fn on_open(&self, registry: &Registry) -> Result<(), NotFound>;

    /// Renders the complete current view as one text frame
    fn render(&self, registry: &Registry) -> String;

    /// Applies one decoded action
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when the action's subject is gone; the action
    /// is dropped and the session continues.
    fn handle(&self, registry: &Registry, action: Action) -> Result<(), NotFound>;

    /// Runs once after the loop exits
    fn on_close(&self, registry: &Registry);
}

/// A player's screen: watches their own topic, counts as an open socket
pub struct PlayerSession {
    /// The player-room binding this socket belongs to
    pub connection: ConnectionId,
    /// The bound player, whose topic drives re-renders
    pub player: PlayerId,
}

impl SessionRole for PlayerSession {
    fn topics(&self) -> Vec<Topic> {
        vec![Topic::Player(self.player)]
    }

    fn on_open(&self, registry: &Registry) -> Result<(), NotFound> {
        registry.set_active(self.connection, true)
    }

    fn render(&self, registry: &Registry) -> String {
        match registry.render_player(self.connection) {
            Ok(view) => view.to_message(),
            Err(error) => PlayerView::Error {
                message: error.to_string(),
            }
            .to_message(),
        }
    }

    fn handle(&self, registry: &Registry, action: Action) -> Result<(), NotFound> {
        match action {
            Action::SetName { player_name } => registry.set_name(self.connection, &player_name),
            Action::TileClick { tile } => registry.tile_click(self.connection, tile),
            Action::SubmitAnswer { answer } => {
                registry.submit_answer(self.connection, Some(&answer))
            }
            Action::NoAnswer => registry.submit_answer(self.connection, None),
            Action::StartNewGame => registry.start_new_game(self.connection),
            Action::RejectName { .. } => {
                debug!(connection = %self.connection, "player sent an owner-only action");
                Ok(())
            }
        }
    }

    fn on_close(&self, registry: &Registry) {
        // The connection may already be gone if the room was deleted.
        if let Err(error) = registry.set_active(self.connection, false) {
            debug!(%error, "closing session for a removed connection");
        }
    }
}

/// An owner dashboard: watches the room topic, moderates names
pub struct OwnerSession {
    /// The watched room
    pub room: RoomCode,
}

impl SessionRole for OwnerSession {
    fn topics(&self) -> Vec<Topic> {
        vec![Topic::Room(self.room.clone())]
    }

    fn on_open(&self, registry: &Registry) -> Result<(), NotFound> {
        registry.render_owner(&self.room).map(|_| ())
    }

    fn render(&self, registry: &Registry) -> String {
        match registry.render_owner(&self.room) {
            Ok(view) => view.to_message(),
            Err(error) => OwnerView::Error {
                message: error.to_string(),
            }
            .to_message(),
        }
    }

    fn handle(&self, registry: &Registry, action: Action) -> Result<(), NotFound> {
        match action {
            Action::RejectName { player_id } => registry.reject_name(&self.room, player_id),
            other => {
                debug!(room = %self.room, action = ?other, "owner sent a player-only action");
                Ok(())
            }
        }
    }

    fn on_close(&self, _registry: &Registry) {}
}

/// Drives one session until its inbound channel closes
///
/// The initial view is pushed immediately after a successful `on_open`;
/// after that the loop alternates between re-rendering on coalesced topic
/// notifications and applying inbound frames. Malformed or invalid frames
/// are logged and dropped. When the embedding server closes the inbound
/// channel the session unsubscribes, runs `on_close` and closes the
/// tunnel.
pub async fn run_session<R: SessionRole>(
    registry: Registry,
    role: R,
    tunnel: impl Tunnel,
    mut frames: UnboundedReceiver<String>,
) {
    let notify = Arc::new(Notify::new());
    let subscriptions: Vec<_> = role
        .topics()
        .into_iter()
        .map(|topic| {
            let notify = Arc::clone(&notify);
            let subscription = registry
                .bus()
                .subscribe(topic.clone(), move || notify.notify_one());
            (topic, subscription)
        })
        .collect();

    match role.on_open(&registry) {
        Ok(()) => {
            tunnel.send(&role.render(&registry));

            loop {
                tokio::select! {
                    () = notify.notified() => {
                        tunnel.send(&role.render(&registry));
                    }
                    frame = frames.recv() => {
                        let Some(frame) = frame else {
                            break;
                        };
                        dispatch_frame(&registry, &role, &frame);
                    }
                }
            }
        }
        Err(error) => {
            warn!(%error, "refusing session");
        }
    }

    for (topic, subscription) in subscriptions {
        registry.bus().unsubscribe(&topic, subscription);
    }
    role.on_close(&registry);
    tunnel.close();
}

/// Decodes, validates and applies one inbound text frame
fn dispatch_frame<R: SessionRole>(registry: &Registry, role: &R, frame: &str) {
    match serde_json::from_str::<Action>(frame) {
        Ok(action) => {
            if let Err(error) = action.validate() {
                debug!(%error, "dropping action failing validation");
                return;
            }
            if let Err(error) = role.handle(registry, action) {
                debug!(%error, "dropping action for a missing entity");
            }
        }
        Err(error) => {
            debug!(%error, "dropping malformed frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use serde_json::Value;
    use tokio::sync::mpsc::{self, UnboundedSender};

    use super::*;
    use crate::{bus::TopicEventBus, question::QuestionCard};

    /// Records every outbound frame for inspection.
    #[derive(Clone, Default)]
    struct RecordingTunnel {
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl Tunnel for RecordingTunnel {
        fn send(&self, message: &str) {
            self.sent.lock().unwrap().push(message.to_owned());
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl RecordingTunnel {
        fn frames(&self) -> Vec<Value> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|frame| serde_json::from_str(frame).unwrap())
                .collect()
        }

        fn frame_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    fn registry_with_room(code: &str, question_count: usize) -> Registry {
        let registry = Registry::new(TopicEventBus::new());
        let cards = (0..question_count)
            .map(|i| {
                QuestionCard::new(format!("question {i}"), vec![format!("answer {i}")]).unwrap()
            })
            .collect();
        registry.create_room(RoomCode::from(code), "owner", cards);
        registry
    }

    /// Lets the spawned session task drain its ready work.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_player_session(
        registry: &Registry,
        binding: crate::registry::Binding,
    ) -> (RecordingTunnel, UnboundedSender<String>, tokio::task::JoinHandle<()>) {
        let tunnel = RecordingTunnel::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_session(
            registry.clone(),
            PlayerSession {
                connection: binding.connection,
                player: binding.player,
            },
            tunnel.clone(),
            rx,
        ));
        (tunnel, tx, handle)
    }

    #[tokio::test]
    async fn test_player_session_pushes_initial_view() {
        let registry = registry_with_room("1234", 3);
        let binding = registry.bind(&RoomCode::from("1234"), None).unwrap();
        let (tunnel, _tx, _handle) = spawn_player_session(&registry, binding);

        settle().await;
        let frames = tunnel.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["view"], "name_prompt");
        assert_eq!(frames[0]["player_id"], binding.player.to_string());
    }

    #[tokio::test]
    async fn test_set_name_frame_triggers_rerender() {
        let registry = registry_with_room("1234", 3);
        let binding = registry.bind(&RoomCode::from("1234"), None).unwrap();
        let (tunnel, tx, _handle) = spawn_player_session(&registry, binding);
        settle().await;

        tx.send(r#"{"action":"set_name","player_name":"Alice"}"#.to_owned())
            .unwrap();
        settle().await;

        let frames = tunnel.frames();
        let last = frames.last().unwrap();
        assert_eq!(last["view"], "waiting");
        assert_eq!(last["player_name"], "Alice");
    }

    #[tokio::test]
    async fn test_malformed_frames_are_dropped_silently() {
        let registry = registry_with_room("1234", 3);
        let binding = registry.bind(&RoomCode::from("1234"), None).unwrap();
        let (tunnel, tx, _handle) = spawn_player_session(&registry, binding);
        settle().await;
        let before = tunnel.frame_count();

        tx.send("not json".to_owned()).unwrap();
        tx.send(r#"{"action":"dance"}"#.to_owned()).unwrap();
        // Overlong name fails validation before dispatch.
        let long = "x".repeat(100);
        tx.send(format!(r#"{{"action":"set_name","player_name":"{long}"}}"#))
            .unwrap();
        settle().await;
        assert_eq!(tunnel.frame_count(), before);

        // The session is still alive and handles the next valid frame.
        tx.send(r#"{"action":"set_name","player_name":"Alice"}"#.to_owned())
            .unwrap();
        settle().await;
        assert!(tunnel.frame_count() > before);
    }

    #[tokio::test]
    async fn test_rapid_publishes_coalesce_into_one_render() {
        let registry = registry_with_room("1234", 3);
        let binding = registry.bind(&RoomCode::from("1234"), None).unwrap();
        let (tunnel, _tx, _handle) = spawn_player_session(&registry, binding);
        settle().await;
        let before = tunnel.frame_count();

        // Three back-to-back publishes while the session is parked.
        let topic = Topic::Player(binding.player);
        for _ in 0..3 {
            registry.bus().publish(&topic);
        }
        settle().await;
        assert_eq!(tunnel.frame_count(), before + 1);
    }

    #[tokio::test]
    async fn test_closing_channel_deactivates_and_unsubscribes() {
        let registry = registry_with_room("1234", 3);
        let binding = registry.bind(&RoomCode::from("1234"), None).unwrap();
        let (tunnel, tx, handle) = spawn_player_session(&registry, binding);
        settle().await;

        let topic = Topic::Player(binding.player);
        assert_eq!(registry.bus().listener_count(&topic), 1);

        drop(tx);
        handle.await.unwrap();

        assert_eq!(registry.bus().listener_count(&topic), 0);
        assert!(tunnel.closed.load(Ordering::SeqCst));
        // The socket count dropped back to zero: a named player with no
        // open socket is not in the pairing pool.
        registry.set_name(binding.connection, "Alice").unwrap();
        assert!(registry
            .waiting_connections(&RoomCode::from("1234"))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_player_session_refused_for_unknown_connection() {
        let registry = registry_with_room("1234", 3);
        let tunnel = RecordingTunnel::default();
        let (_tx, rx) = mpsc::unbounded_channel();

        run_session(
            registry.clone(),
            PlayerSession {
                connection: ConnectionId::new(),
                player: PlayerId::new(),
            },
            tunnel.clone(),
            rx,
        )
        .await;

        assert_eq!(tunnel.frame_count(), 0);
        assert!(tunnel.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_owner_session_sees_player_changes() {
        let registry = registry_with_room("1234", 3);
        let tunnel = RecordingTunnel::default();
        let (_tx, rx) = mpsc::unbounded_channel();
        let _handle = tokio::spawn(run_session(
            registry.clone(),
            OwnerSession {
                room: RoomCode::from("1234"),
            },
            tunnel.clone(),
            rx,
        ));
        settle().await;

        let binding = registry.bind(&RoomCode::from("1234"), None).unwrap();
        registry.set_active(binding.connection, true).unwrap();
        registry.set_name(binding.connection, "Alice").unwrap();
        settle().await;

        let frames = tunnel.frames();
        let last = frames.last().unwrap();
        assert_eq!(last["view"], "room");
        assert_eq!(last["players"][0]["name"], "Alice");
        assert_eq!(last["waiting"][0]["name"], "Alice");
    }

    #[tokio::test]
    async fn test_owner_reject_name_flows_back_to_player() {
        let registry = registry_with_room("1234", 3);
        let binding = registry.bind(&RoomCode::from("1234"), None).unwrap();
        let (player_tunnel, _player_tx, _player_handle) =
            spawn_player_session(&registry, binding);
        let owner_tunnel = RecordingTunnel::default();
        let (owner_tx, owner_rx) = mpsc::unbounded_channel();
        let _owner_handle = tokio::spawn(run_session(
            registry.clone(),
            OwnerSession {
                room: RoomCode::from("1234"),
            },
            owner_tunnel.clone(),
            owner_rx,
        ));
        settle().await;

        registry.set_name(binding.connection, "Bob").unwrap();
        settle().await;
        assert_eq!(player_tunnel.frames().last().unwrap()["view"], "waiting");

        owner_tx
            .send(format!(
                r#"{{"action":"reject_name","player_id":"{}"}}"#,
                binding.player
            ))
            .unwrap();
        settle().await;

        let last = player_tunnel.frames();
        assert_eq!(last.last().unwrap()["view"], "name_prompt");
    }
}
