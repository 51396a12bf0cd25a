use clap::Parser;
use log::info;
use server::config::{GameConfig, PhysicsConfig, ServerConfig};
use server::network::Server;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative air hockey game server")]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3001")]
    port: u16,

    /// Path that accepts WebSocket upgrades
    #[arg(long, default_value = "/ws")]
    ws_path: String,

    /// Physics step in milliseconds
    #[arg(long, default_value = "20")]
    physics_ms: u64,

    /// Snapshot broadcast period in milliseconds
    #[arg(long, default_value = "20")]
    network_ms: u64,

    /// Minimum gap between two paddle moves of one player, in milliseconds
    #[arg(long, default_value = "20")]
    throttle_ms: u64,

    /// Goals needed to win a match
    #[arg(long, default_value = "10")]
    max_goals: u32,

    /// Seconds without a message before a client is dropped
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Seconds between matchmaking passes
    #[arg(long, default_value = "1")]
    matchmaking_secs: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let physics_cycle = Duration::from_millis(self.physics_ms.max(1));
        let defaults = ServerConfig::default();

        ServerConfig {
            host: self.host,
            port: self.port,
            ws_path: self.ws_path,
            message_timeout: Duration::from_secs(self.timeout_secs),
            handshake_timeout: Duration::from_secs(self.timeout_secs),
            matchmaking_interval: Duration::from_secs(self.matchmaking_secs.max(1)),
            game: GameConfig {
                physics_cycle,
                network_cycle: Duration::from_millis(self.network_ms.max(1)),
                input_throttle: Duration::from_millis(self.throttle_ms),
                physics: PhysicsConfig {
                    max_puck_speed: PhysicsConfig::derived_max_speed(physics_cycle),
                    max_goals: self.max_goals.max(1),
                    ..PhysicsConfig::default()
                },
                ..GameConfig::default()
            },
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.into_config();
    info!(
        "Starting air hockey server on {} ({:?} physics, {:?} broadcast)",
        config.address(),
        config.game.physics_cycle,
        config.game.network_cycle
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
