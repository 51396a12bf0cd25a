//! Session actor: one task per running game.
//!
//! The room owns its [`World`] outright. Player actions reach it through one
//! bounded channel per seat, and the registry stops it through a oneshot
//! exit signal, so no lock is ever taken on the simulation state.

use crate::config::GameConfig;
use crate::physics::{PhysicsEngine, TickOutcome};
use crate::player::{PlayerId, PlayerLink, RoomId};
use crate::pool::Pool;
use crate::world::{Seat, World};
use log::{debug, info};
use shared::{ClientMessage, ServerMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

/// Actions buffered per seat before new ones are dropped.
pub const INPUT_CAPACITY: usize = 16;

pub const REASON_FINISHED: &str = "game is finished";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Active,
    /// The match is decided and the registry has been asked to close it.
    Terminating,
    Closed,
}

/// The registry's side of a room: who plays in it and how to stop it.
#[derive(Debug)]
pub struct RoomHandle {
    pub id: RoomId,
    pub player_a: PlayerId,
    pub player_b: PlayerId,
    exit: Option<oneshot::Sender<String>>,
}

impl RoomHandle {
    pub fn players(&self) -> [PlayerId; 2] {
        [self.player_a, self.player_b]
    }

    pub fn seat_of(&self, player: PlayerId) -> Option<Seat> {
        if player == self.player_a {
            Some(Seat::A)
        } else if player == self.player_b {
            Some(Seat::B)
        } else {
            None
        }
    }

    /// Tells the room actor to stop. Only the first call has an effect.
    pub fn close(&mut self, reason: &str) {
        if let Some(exit) = self.exit.take() {
            // The actor may already be gone.
            let _ = exit.send(reason.to_string());
        }
    }
}

/// Senders feeding the two seats of a new room.
pub struct SeatInputs {
    pub a: mpsc::Sender<ClientMessage>,
    pub b: mpsc::Sender<ClientMessage>,
}

struct SeatState {
    link: PlayerLink,
    input: mpsc::Receiver<ClientMessage>,
    last_accepted: Option<Instant>,
}

impl SeatState {
    fn new(link: PlayerLink, input: mpsc::Receiver<ClientMessage>) -> Self {
        Self {
            link,
            input,
            last_accepted: None,
        }
    }
}

pub struct Room {
    id: RoomId,
    config: GameConfig,
    engine: PhysicsEngine,
    world: World,
    state: RoomState,
    seat_a: SeatState,
    seat_b: SeatState,
    exit: oneshot::Receiver<String>,
    pool: Arc<Pool>,
}

impl Room {
    /// Builds a room for two players along with the handle the registry keeps
    /// and the senders for each seat's actions.
    pub fn new(
        id: RoomId,
        config: GameConfig,
        pool: Arc<Pool>,
        player_a: PlayerLink,
        player_b: PlayerLink,
    ) -> (Room, RoomHandle, SeatInputs) {
        let (exit_tx, exit_rx) = oneshot::channel();
        let (a_tx, a_rx) = mpsc::channel(INPUT_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(INPUT_CAPACITY);

        let handle = RoomHandle {
            id,
            player_a: player_a.id(),
            player_b: player_b.id(),
            exit: Some(exit_tx),
        };

        let room = Room {
            id,
            engine: PhysicsEngine::new(config.physics.clone()),
            config,
            world: World::new(),
            state: RoomState::Active,
            seat_a: SeatState::new(player_a, a_rx),
            seat_b: SeatState::new(player_b, b_rx),
            exit: exit_rx,
            pool,
        };

        (room, handle, SeatInputs { a: a_tx, b: b_tx })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Runs the session until the registry signals exit, then hands back the
    /// final state of the world.
    pub async fn run(mut self) -> World {
        let mut physics_timer = interval(self.config.physics_cycle);
        physics_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_timer = interval(self.config.network_cycle);
        broadcast_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_tick = Instant::now();
        let mut ticks: u64 = 0;

        info!(
            "Room {} started: {} vs {}",
            self.id,
            self.seat_a.link.id(),
            self.seat_b.link.id()
        );

        loop {
            let active = self.state == RoomState::Active;

            tokio::select! {
                biased;

                reason = &mut self.exit => {
                    let reason = reason.unwrap_or_else(|_| "registry dropped the room".to_string());
                    info!("Room {} closing: {}", self.id, reason);
                    break;
                }

                Some(message) = self.seat_a.input.recv(), if active => {
                    self.handle_input(Seat::A, message, Instant::now());
                }

                Some(message) = self.seat_b.input.recv(), if active => {
                    self.handle_input(Seat::B, message, Instant::now());
                }

                _ = physics_timer.tick(), if active => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;

                    self.tick(elapsed).await;

                    ticks += 1;
                    if ticks % 500 == 0 {
                        debug!(
                            "Room {}: tick {}, score {}:{}",
                            self.id, ticks, self.world.goals_a, self.world.goals_b
                        );
                    }
                }

                _ = broadcast_timer.tick(), if active => {
                    self.broadcast();
                }
            }
        }

        self.state = RoomState::Closed;
        self.world
    }

    /// Applies a paddle move, at most one per seat per throttle window.
    /// Returns whether the message changed the world.
    fn handle_input(&mut self, seat: Seat, message: ClientMessage, now: Instant) -> bool {
        let ClientMessage::PlayerAction(requested) = message else {
            debug!("Room {} ignoring {:?} from seat {:?}", self.id, message, seat);
            return false;
        };

        let throttle = self.config.input_throttle;
        let state = self.seat_mut(seat);
        if let Some(last) = state.last_accepted {
            if now.saturating_duration_since(last) < throttle {
                return false;
            }
        }
        state.last_accepted = Some(now);

        self.world.set_paddle(seat, requested);
        true
    }

    /// Advances the puck and ends the match once a side reaches the goal limit.
    async fn tick(&mut self, elapsed: Duration) {
        let elapsed = if elapsed > self.config.max_delta {
            debug!(
                "Room {}: large delta time {:?}, capping to {:?}",
                self.id, elapsed, self.config.max_delta
            );
            self.config.max_delta
        } else {
            elapsed
        };

        if let TickOutcome::Goal {
            match_over: true, ..
        } = self.engine.step(&mut self.world, elapsed)
        {
            self.state = RoomState::Terminating;
            info!(
                "Room {} finished {}:{}",
                self.id, self.world.goals_a, self.world.goals_b
            );
            self.broadcast();
            self.pool.delete_room(self.id, REASON_FINISHED).await;
        }
    }

    /// Sends each seat its own view of the world.
    fn broadcast(&self) {
        for seat in [Seat::A, Seat::B] {
            let snapshot = self.world.snapshot_for(seat);
            self.seat(seat).link.deliver(ServerMessage::World(snapshot));
        }
    }

    fn seat(&self, seat: Seat) -> &SeatState {
        match seat {
            Seat::A => &self.seat_a,
            Seat::B => &self.seat_b,
        }
    }

    fn seat_mut(&mut self, seat: Seat) -> &mut SeatState {
        match seat {
            Seat::A => &mut self.seat_a,
            Seat::B => &mut self.seat_b,
        }
    }
}
