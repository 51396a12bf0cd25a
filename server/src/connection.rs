//! WebSocket connection actors.
//!
//! Each accepted socket gets a reader, which runs the `HELLO` handshake, then
//! dispatches client messages and drives the ping timer, and a writer that
//! drains the player's bounded outbound queue. Either side failing kicks the
//! other, and the registry is cleaned up once the reader returns.

use crate::error::{Result, ServerError};
use crate::player::{ConnectionId, PlayerId};
use crate::pool::Pool;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message, WebSocketStream};

type WsStream = WebSocketStream<TcpStream>;
type WsSink = SplitSink<WsStream, Message>;
type WsReceiver = SplitStream<WsStream>;

/// Serves one TCP connection until it closes, times out or is kicked.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, pool: Arc<Pool>) {
    let handshake_timeout = pool.config().handshake_timeout;
    let ws_path = pool.config().ws_path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == ws_path {
            Ok(response)
        } else {
            warn!("Rejecting upgrade to {} from {}", request.uri().path(), addr);
            Err(not_found())
        }
    };

    let ws_stream = match timeout(handshake_timeout, accept_hdr_async(stream, check_path)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
        Err(_) => {
            warn!("WebSocket handshake from {} timed out", addr);
            return;
        }
    };

    let kick = Arc::new(Notify::new());
    let id = pool.add_connection(addr, Arc::clone(&kick)).await;
    let connection = Connection {
        id,
        addr,
        pool: Arc::clone(&pool),
        kick,
    };

    match connection.serve(ws_stream).await {
        Ok(()) | Err(ServerError::ConnectionClosed) => {
            info!("Connection {} from {} closed", id, addr)
        }
        Err(e) => warn!("Connection {} from {} dropped: {}", id, addr, e),
    }

    pool.disconnect(id).await;
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("not found".to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    pool: Arc<Pool>,
    kick: Arc<Notify>,
}

impl Connection {
    async fn serve(&self, ws_stream: WsStream) -> Result<()> {
        let config = self.pool.config().clone();
        let (mut sink, mut receiver) = ws_stream.split();

        let requested = self.read_hello(&mut receiver, config.handshake_timeout).await?;

        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
        let player_id = self
            .pool
            .register_player(self.id, requested, outbound_tx)
            .await
            .ok_or(ServerError::ConnectionClosed)?;

        send_message(&mut sink, &ServerMessage::Hello(player_id), config.message_timeout).await?;
        info!("Player {} connected from {}", player_id, self.addr);
        self.pool.update_online().await;

        let writer = tokio::spawn(write_loop(
            sink,
            outbound_rx,
            config.message_timeout,
            Arc::clone(&self.kick),
        ));

        let result = self
            .read_loop(player_id, &mut receiver, config.message_timeout, config.ping_rate)
            .await;

        writer.abort();
        result
    }

    /// Waits for the client's `HELLO`. Anything else sent before it is ignored.
    async fn read_hello(
        &self,
        receiver: &mut WsReceiver,
        handshake_timeout: Duration,
    ) -> Result<Option<PlayerId>> {
        let deadline = Instant::now() + handshake_timeout;

        loop {
            let frame = match timeout_at(deadline, receiver.next()).await {
                Err(_) => return Err(ServerError::HandshakeTimeout(handshake_timeout)),
                Ok(None) => return Err(ServerError::HandshakeClosed),
                Ok(Some(frame)) => frame?,
            };

            match frame {
                Message::Text(text) => match ClientMessage::parse(text.as_str()) {
                    Ok(ClientMessage::Hello(requested)) => return Ok(requested),
                    Ok(other) => {
                        debug!("Connection {} sent {:?} before HELLO", self.id, other)
                    }
                    Err(e) => debug!("Connection {} sent a bad frame: {}", self.id, e),
                },
                Message::Close(_) => return Err(ServerError::HandshakeClosed),
                _ => {}
            }
        }
    }

    async fn read_loop(
        &self,
        player_id: PlayerId,
        receiver: &mut WsReceiver,
        message_timeout: Duration,
        ping_rate: Duration,
    ) -> Result<()> {
        let mut ping_timer = interval(ping_rate);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut deadline = Instant::now() + message_timeout;

        loop {
            tokio::select! {
                _ = self.kick.notified() => {
                    info!("Connection {} of player {} kicked", self.id, player_id);
                    return Ok(());
                }

                _ = ping_timer.tick() => {
                    self.pool.send_ping(player_id).await;
                }

                frame = timeout_at(deadline, receiver.next()) => {
                    let frame = match frame {
                        Err(_) => return Err(ServerError::Timeout(message_timeout)),
                        Ok(None) => return Err(ServerError::ConnectionClosed),
                        Ok(Some(frame)) => frame?,
                    };
                    deadline = Instant::now() + message_timeout;

                    match frame {
                        Message::Text(text) => self.dispatch(player_id, text.as_str()).await,
                        Message::Close(_) => return Ok(()),
                        // Control frames are answered by tungstenite itself.
                        _ => {}
                    }
                }
            }
        }
    }

    async fn dispatch(&self, player_id: PlayerId, text: &str) {
        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping frame from player {}: {}", player_id, e);
                return;
            }
        };

        match message {
            ClientMessage::Queue => {
                self.pool.queue_player(player_id).await;
            }
            ClientMessage::Unqueue => {
                self.pool.unqueue_player(player_id).await;
            }
            ClientMessage::Pong { timestamp } => {
                if let Some(latency) = self.pool.record_pong(player_id, timestamp).await {
                    debug!("Player {} latency {} ms", player_id, latency);
                }
            }
            ClientMessage::ExitGame(reason) => {
                self.pool.leave_room(player_id, &reason).await;
            }
            action @ ClientMessage::PlayerAction(_) => {
                self.pool.forward_input(player_id, action).await;
            }
            ClientMessage::Hello(_) => {
                debug!("Player {} repeated HELLO", player_id);
            }
        }
    }
}

/// Drains the outbound queue onto the socket. A failed or slow write kicks
/// the connection.
async fn write_loop(
    mut sink: WsSink,
    mut outbound: mpsc::Receiver<ServerMessage>,
    write_timeout: Duration,
    kick: Arc<Notify>,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = send_message(&mut sink, &message, write_timeout).await {
            warn!("Failed to write to client: {}", e);
            kick.notify_one();
            return;
        }
    }
}

async fn send_message(
    sink: &mut WsSink,
    message: &ServerMessage,
    write_timeout: Duration,
) -> Result<()> {
    timeout(write_timeout, sink.send(Message::text(message.to_string())))
        .await
        .map_err(|_| ServerError::Timeout(write_timeout))??;
    Ok(())
}
