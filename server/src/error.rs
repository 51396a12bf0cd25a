use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures that end a single connection. None of them affect other players.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no message within {0:?}")]
    Timeout(Duration),

    #[error("handshake not completed within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("connection closed during handshake")]
    HandshakeClosed,

    #[error("connection closed by peer")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, ServerError>;
