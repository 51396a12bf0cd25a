//! Runtime tunables for the server, the session loop and the physics.

use shared::ENTITY_RADIUS;
use std::time::Duration;

/// Default physics step, in milliseconds.
pub const PHYSICS_CYCLE_MS: u64 = 20;
/// Default snapshot broadcast period, in milliseconds.
pub const NETWORK_CYCLE_MS: u64 = 20;
/// Minimum gap between two accepted paddle moves of one player, in milliseconds.
pub const PLAYER_MESSAGE_THROTTLE_MS: u64 = 20;
pub const DEFAULT_DRAG: f64 = 0.01;
/// Extra separation kept between the puck and whatever it bounced off.
pub const COLLISION_DISTANCE: f64 = 0.1;
pub const MAX_GOALS: u32 = 10;

/// Tunables of the puck simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    /// Fraction of velocity lost on every tick without a collision.
    pub drag: f64,
    /// Upper bound on puck speed, in rink units per millisecond.
    pub max_puck_speed: f64,
    /// First side to reach this many goals ends the match.
    pub max_goals: u32,
    pub collision_distance: f64,
}

impl PhysicsConfig {
    /// Speed at which the puck travels exactly one radius per physics step,
    /// so it cannot skip over a paddle between two ticks.
    pub fn derived_max_speed(physics_cycle: Duration) -> f64 {
        let cycle_ms = physics_cycle.as_secs_f64() * 1000.0;
        if cycle_ms <= 0.0 {
            return ENTITY_RADIUS as f64;
        }
        ENTITY_RADIUS as f64 / cycle_ms
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            drag: DEFAULT_DRAG,
            max_puck_speed: Self::derived_max_speed(Duration::from_millis(PHYSICS_CYCLE_MS)),
            max_goals: MAX_GOALS,
            collision_distance: COLLISION_DISTANCE,
        }
    }
}

/// Timing of a single game session.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub physics_cycle: Duration,
    pub network_cycle: Duration,
    pub input_throttle: Duration,
    /// Largest elapsed time fed into one physics step.
    pub max_delta: Duration,
    pub physics: PhysicsConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            physics_cycle: Duration::from_millis(PHYSICS_CYCLE_MS),
            network_cycle: Duration::from_millis(NETWORK_CYCLE_MS),
            input_throttle: Duration::from_millis(PLAYER_MESSAGE_THROTTLE_MS),
            max_delta: Duration::from_millis(50),
            physics: PhysicsConfig::default(),
        }
    }
}

/// Everything the process needs to serve games.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Only WebSocket upgrades to this path are accepted.
    pub ws_path: String,
    /// Read and write deadline for a single WebSocket message.
    pub message_timeout: Duration,
    /// Time a new connection gets to complete the `HELLO` exchange.
    pub handshake_timeout: Duration,
    pub ping_rate: Duration,
    pub matchmaking_interval: Duration,
    /// Outbound messages buffered per player before it counts as unresponsive.
    pub outbound_capacity: usize,
    pub game: GameConfig,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            ws_path: "/ws".to_string(),
            message_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            ping_rate: Duration::from_secs(1),
            matchmaking_interval: Duration::from_secs(1),
            outbound_capacity: 64,
            game: GameConfig::default(),
        }
    }
}
