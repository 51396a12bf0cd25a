//! Per-player state kept by the registry.
//!
//! A player is reachable in two directions: the [`PlayerLink`] carries
//! server messages out to its connection, and the optional seat sender
//! carries its actions into the room it plays in.

use log::{debug, warn};
use shared::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

pub type PlayerId = Uuid;
pub type ConnectionId = Uuid;
pub type RoomId = Uuid;

/// Outbound half of a player's connection.
///
/// Cloned into the room so it can broadcast without going through the
/// registry.
#[derive(Debug, Clone)]
pub struct PlayerLink {
    id: PlayerId,
    outbound: mpsc::Sender<ServerMessage>,
    kick: Arc<Notify>,
}

impl PlayerLink {
    pub fn new(id: PlayerId, outbound: mpsc::Sender<ServerMessage>, kick: Arc<Notify>) -> Self {
        Self { id, outbound, kick }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Queues a message for the connection's writer without waiting.
    ///
    /// A full queue means the peer is not reading; a closed one means the
    /// writer is gone. Either way the connection is told to shut down and
    /// `false` is returned.
    pub fn deliver(&self, message: ServerMessage) -> bool {
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Player {} is not keeping up, dropping connection", self.id);
                self.kick();
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound queue of player {} is closed", self.id);
                self.kick();
                false
            }
        }
    }

    /// Asks the owning connection to close.
    pub fn kick(&self) {
        self.kick.notify_one();
    }
}

#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub connection_id: ConnectionId,
    pub room_id: Option<RoomId>,
    /// Half of the last measured round trip.
    pub latency_ms: u64,
    link: PlayerLink,
    input: Option<mpsc::Sender<ClientMessage>>,
}

impl Player {
    pub fn new(connection_id: ConnectionId, link: PlayerLink) -> Self {
        Self {
            id: link.id(),
            connection_id,
            room_id: None,
            latency_ms: 0,
            link,
            input: None,
        }
    }

    pub fn link(&self) -> &PlayerLink {
        &self.link
    }

    pub fn send(&self, message: ServerMessage) -> bool {
        self.link.deliver(message)
    }

    pub fn is_seated(&self) -> bool {
        self.room_id.is_some()
    }

    /// Connects the player to a seat of `room_id`.
    pub fn take_seat(&mut self, room_id: RoomId, input: mpsc::Sender<ClientMessage>) {
        self.room_id = Some(room_id);
        self.input = Some(input);
    }

    /// Detaches the player from its room. Returns the room it was in.
    pub fn leave_seat(&mut self) -> Option<RoomId> {
        self.input = None;
        self.room_id.take()
    }

    /// Hands an action to the player's seat. Actions that arrive while the
    /// seat is still busy are dropped, the room would throttle them anyway.
    pub fn forward(&self, message: ClientMessage) -> bool {
        let Some(input) = &self.input else {
            return false;
        };

        match input.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Seat of player {} is busy, dropping action", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
