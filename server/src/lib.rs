//! # Air Hockey Server Library
//!
//! Authoritative server for real-time two-player air hockey. Clients only
//! report where they want their paddle to be; the server owns the puck,
//! resolves every collision and tells both players what happened.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Each running game is a [`room::Room`] task that owns its [`world::World`]
//! and advances it with the continuous collision [`physics::PhysicsEngine`] on
//! a fixed tick. The puck is swept along its whole path every step, so it
//! cannot pass through a wall or a paddle even at top speed.
//!
//! ### Matchmaking
//! The [`pool::Pool`] keeps track of connections, players, the waiting queue
//! and live rooms. A matchmaking task pairs the two longest-waiting players
//! once per interval and starts a room for them, seats assigned at random.
//!
//! ### Per-Player Views
//! Seat A sees the rink as the server does. Seat B sees it rotated by 180
//! degrees, so every player defends the bottom goal on their own screen.
//! Input and snapshots for seat B are mirrored in the world model.
//!
//! ## Architecture Design
//!
//! ### Actors and Channels
//! Every connection runs a reader and a writer task, every game a room task,
//! and one task runs matchmaking. They talk through bounded `tokio::sync::mpsc`
//! channels; the registry is the only shared state and sits behind a single
//! mutex. A peer that cannot keep up with its outbound queue is disconnected
//! instead of slowing down the game.
//!
//! ### WebSocket Transport
//! Clients connect over WebSocket and exchange flat, colon-delimited text
//! frames such as `PLAYERACTION:400:900`. The codec lives in the `shared`
//! crate so clients and tests use the same parser.
//!
//! ## Module Organization
//!
//! - `config`: tunables and their defaults
//! - `connection`: handshake, reader and writer per socket
//! - `error`: connection-level error type
//! - `network`: TCP listener and task startup
//! - `physics`: puck stepping, collision response and goal detection
//! - `player`: per-player links into connections and rooms
//! - `pool`: the registry and matchmaking
//! - `room`: the per-game session actor
//! - `world`: rink walls, paddles, puck and score
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod network;
pub mod physics;
pub mod player;
pub mod pool;
pub mod room;
pub mod world;
