//! Registry of connections, players, the matchmaking queue and live rooms.
//!
//! Everything sits behind one async mutex. Operations that touch several
//! collections, like removing a player that is both queued and seated, run as
//! a single critical section so no other task can observe a half-removed
//! player. While the lock is held nothing awaits another actor: messages go
//! out through non-blocking sends only.

use crate::config::ServerConfig;
use crate::player::{ConnectionId, Player, PlayerId, PlayerLink, RoomId};
use crate::room::{Room, RoomHandle};
use log::{debug, info, warn};
use rand::Rng;
use shared::{ClientMessage, ServerMessage};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

pub const REASON_DISCONNECTED: &str = "player disconnected";
pub const REASON_LEFT: &str = "player left the game";

/// An accepted socket, known before its player has said hello.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub addr: SocketAddr,
    pub kick: Arc<Notify>,
}

#[derive(Debug, Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    players: HashMap<PlayerId, Player>,
    queue: VecDeque<PlayerId>,
    rooms: HashMap<RoomId, RoomHandle>,
}

impl Registry {
    fn unqueue(&mut self, player_id: PlayerId) -> bool {
        match self.queue.iter().position(|id| *id == player_id) {
            Some(index) => {
                self.queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Unseats both occupants, tells them why, and stops the room actor.
    fn delete_room(&mut self, room_id: RoomId, reason: &str) -> bool {
        let Some(mut room) = self.rooms.remove(&room_id) else {
            return false;
        };

        let notice = ServerMessage::exit_game(reason);
        for player_id in room.players() {
            if let Some(player) = self.players.get_mut(&player_id) {
                player.leave_seat();
                player.send(notice.clone());
            }
        }

        room.close(reason);
        info!("Room {} deleted: {}", room_id, reason);
        true
    }

    /// Forgets a connection and returns the player it owns, if any.
    fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<PlayerId> {
        if let Some(connection) = self.connections.remove(&connection_id) {
            info!("Connection {} from {} closed", connection_id, connection.addr);
        }
        self.players
            .values()
            .find(|player| player.connection_id == connection_id)
            .map(|player| player.id)
    }

    /// Drops a player along with its queue entry and its room.
    fn remove_player(&mut self, player_id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&player_id)?;
        self.unqueue(player_id);
        if let Some(room_id) = player.room_id {
            self.delete_room(room_id, REASON_DISCONNECTED);
        }
        info!("Player {} removed", player_id);
        Some(player)
    }

    fn broadcast_online(&self) {
        let message = ServerMessage::Online(self.players.len());
        for player in self.players.values() {
            player.send(message.clone());
        }
    }
}

pub struct Pool {
    config: ServerConfig,
    registry: Mutex<Registry>,
}

impl Pool {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn add_connection(&self, addr: SocketAddr, kick: Arc<Notify>) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut registry = self.registry.lock().await;
        registry
            .connections
            .insert(id, ConnectionHandle { addr, kick });
        info!("Connection {} opened from {}", id, addr);
        id
    }

    /// Forgets a connection and hands back its owning player for cleanup.
    /// The player itself stays registered.
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Option<PlayerId> {
        let mut registry = self.registry.lock().await;
        registry.remove_connection(connection_id)
    }

    /// Registers the player behind a connection that completed its handshake.
    ///
    /// A requested id that is still online belongs to a stale session: that
    /// player is removed first, and its old connection kicked. Returns `None`
    /// when the connection is not known.
    pub async fn register_player(
        &self,
        connection_id: ConnectionId,
        requested: Option<PlayerId>,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Option<PlayerId> {
        let mut registry = self.registry.lock().await;
        let kick = Arc::clone(&registry.connections.get(&connection_id)?.kick);

        let player_id = requested.unwrap_or_else(Uuid::new_v4);
        if let Some(stale) = registry.remove_player(player_id) {
            info!("Player {} reconnected, replacing previous session", player_id);
            if stale.connection_id != connection_id {
                stale.link().kick();
            }
        }

        let link = PlayerLink::new(player_id, outbound, kick);
        registry
            .players
            .insert(player_id, Player::new(connection_id, link));
        info!(
            "Player {} registered on connection {}, {} online",
            player_id,
            connection_id,
            registry.players.len()
        );
        Some(player_id)
    }

    /// Puts a player at the back of the queue. Players already queued or
    /// already in a game are left alone.
    pub async fn queue_player(&self, player_id: PlayerId) -> bool {
        let mut registry = self.registry.lock().await;
        match registry.players.get(&player_id) {
            Some(player) if !player.is_seated() => {}
            _ => return false,
        }
        if registry.queue.contains(&player_id) {
            return false;
        }

        registry.queue.push_back(player_id);
        info!(
            "Player {} queued, {} waiting",
            player_id,
            registry.queue.len()
        );
        true
    }

    pub async fn unqueue_player(&self, player_id: PlayerId) -> bool {
        let mut registry = self.registry.lock().await;
        let removed = registry.unqueue(player_id);
        if removed {
            info!(
                "Player {} left the queue, {} waiting",
                player_id,
                registry.queue.len()
            );
        }
        removed
    }

    pub async fn remove_player(&self, player_id: PlayerId) -> bool {
        let mut registry = self.registry.lock().await;
        registry.remove_player(player_id).is_some()
    }

    /// Cleans up after a connection ends. The player it owns goes with it,
    /// unless a newer connection has taken the id over, and everyone hears
    /// the new online count.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut registry = self.registry.lock().await;
        if let Some(player_id) = registry.remove_connection(connection_id) {
            registry.remove_player(player_id);
        }

        registry.broadcast_online();
        info!(
            "Connection {} finished, {} players online",
            connection_id,
            registry.players.len()
        );
    }

    /// Seats two players in a new room. Which of them gets seat A is random.
    pub async fn create_room(self: &Arc<Self>, first: PlayerId, second: PlayerId) -> Option<Room> {
        let mut registry = self.registry.lock().await;
        self.create_room_locked(&mut registry, first, second)
    }

    fn create_room_locked(
        self: &Arc<Self>,
        registry: &mut Registry,
        first: PlayerId,
        second: PlayerId,
    ) -> Option<Room> {
        if first == second {
            return None;
        }
        let (a, b) = if rand::thread_rng().gen::<bool>() {
            (first, second)
        } else {
            (second, first)
        };

        let link_a = seatable(registry, a)?;
        let link_b = seatable(registry, b)?;

        let room_id = Uuid::new_v4();
        let (room, handle, inputs) = Room::new(
            room_id,
            self.config.game.clone(),
            Arc::clone(self),
            link_a,
            link_b,
        );

        for (player_id, input) in [(a, inputs.a), (b, inputs.b)] {
            registry.unqueue(player_id);
            if let Some(player) = registry.players.get_mut(&player_id) {
                player.take_seat(room_id, input);
            }
        }
        registry.rooms.insert(room_id, handle);

        info!("Room {} created: {} (A) vs {} (B)", room_id, a, b);
        Some(room)
    }

    /// Pairs waiting players oldest first and tells each pair its room id.
    /// The rooms are returned unstarted.
    pub async fn match_waiting_players(self: &Arc<Self>) -> Vec<Room> {
        let mut registry = self.registry.lock().await;
        let mut rooms = Vec::new();

        while registry.queue.len() >= 2 {
            let (Some(first), Some(second)) = (registry.queue.pop_front(), registry.queue.pop_front())
            else {
                break;
            };

            match self.create_room_locked(&mut registry, first, second) {
                Some(room) => {
                    for player_id in [first, second] {
                        if let Some(player) = registry.players.get(&player_id) {
                            player.send(ServerMessage::Game(room.id()));
                        }
                    }
                    rooms.push(room);
                }
                None => warn!("Could not seat {} and {}", first, second),
            }
        }

        rooms
    }

    /// Matchmaking actor: pairs queued players every interval and starts a
    /// task per new room.
    pub async fn run_matchmaking(self: Arc<Self>) {
        let mut timer = interval(self.config.matchmaking_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;

            for room in self.match_waiting_players().await {
                debug!("Starting room {}", room.id());
                tokio::spawn(room.run());
            }
        }
    }

    /// Closes a room, telling both players `reason`. Absent rooms are ignored.
    pub async fn delete_room(&self, room_id: RoomId, reason: &str) -> bool {
        let mut registry = self.registry.lock().await;
        registry.delete_room(room_id, reason)
    }

    /// A player asked to quit its game; the opponent is told why.
    pub async fn leave_room(&self, player_id: PlayerId, reason: &str) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(room_id) = registry.players.get(&player_id).and_then(|p| p.room_id) else {
            return false;
        };
        let reason = if reason.trim().is_empty() {
            REASON_LEFT
        } else {
            reason
        };
        registry.delete_room(room_id, reason)
    }

    /// Routes an action to the seat of the player's current room.
    pub async fn forward_input(&self, player_id: PlayerId, message: ClientMessage) -> bool {
        let registry = self.registry.lock().await;
        registry
            .players
            .get(&player_id)
            .is_some_and(|player| player.forward(message))
    }

    /// Sends a `PING` stamped with the current time and the last latency.
    pub async fn send_ping(&self, player_id: PlayerId) -> bool {
        let registry = self.registry.lock().await;
        registry.players.get(&player_id).is_some_and(|player| {
            player.send(ServerMessage::Ping {
                timestamp: unix_millis(),
                latency: player.latency_ms,
            })
        })
    }

    /// Stores half the round trip of a `PING` echoed at `timestamp`.
    ///
    /// Timestamps ahead of the clock count as a zero round trip. A round trip
    /// longer than `message_timeout` cannot answer a live ping, so it is
    /// ignored and `None` returned.
    pub async fn record_pong(&self, player_id: PlayerId, timestamp: i64) -> Option<u64> {
        let mut registry = self.registry.lock().await;
        let player = registry.players.get_mut(&player_id)?;

        let round_trip = unix_millis().saturating_sub(timestamp).max(0) as u64;
        if u128::from(round_trip) > self.config.message_timeout.as_millis() {
            debug!(
                "Ignoring PONG from {} with a {} ms round trip",
                player_id, round_trip
            );
            return None;
        }

        player.latency_ms = round_trip / 2;
        Some(player.latency_ms)
    }

    /// Tells every player how many players are online.
    pub async fn update_online(&self) {
        let registry = self.registry.lock().await;
        registry.broadcast_online();
    }

    pub async fn player_count(&self) -> usize {
        self.registry.lock().await.players.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.connections.len()
    }

    pub async fn queue_len(&self) -> usize {
        self.registry.lock().await.queue.len()
    }

    pub async fn room_count(&self) -> usize {
        self.registry.lock().await.rooms.len()
    }

    pub async fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        let registry = self.registry.lock().await;
        registry.players.get(&player_id).and_then(|p| p.room_id)
    }
}

/// Link of a registered player that is free to take a seat.
fn seatable(registry: &Registry, player_id: PlayerId) -> Option<PlayerLink> {
    registry
        .players
        .get(&player_id)
        .filter(|player| !player.is_seated())
        .map(|player| player.link().clone())
}

/// Milliseconds since the Unix epoch, as carried by `PING`.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}
