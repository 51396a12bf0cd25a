//! TCP listener and startup of the long-running server tasks.

use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::error::Result;
use crate::pool::Pool;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Accepts WebSocket clients and runs matchmaking for them.
pub struct Server {
    listener: TcpListener,
    pool: Arc<Pool>,
}

impl Server {
    /// Binds the listening socket. Port 0 picks a free port, see
    /// [`Server::local_addr`].
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            pool: Arc::new(Pool::new(config)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn pool(&self) -> Arc<Pool> {
        Arc::clone(&self.pool)
    }

    /// Runs until the listener fails. Each connection gets its own task.
    pub async fn run(self) -> Result<()> {
        tokio::spawn(Arc::clone(&self.pool).run_matchmaking());
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        error!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    tokio::spawn(handle_connection(stream, addr, Arc::clone(&self.pool)));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}
