//! Integration tests for the air hockey server
//!
//! These tests run a real server on a free local port and talk to it over
//! WebSocket exactly like a game client would.

use futures::{SinkExt, StreamExt};
use server::config::ServerConfig;
use server::network::Server;
use shared::{ClientMessage, Position, ServerMessage, WorldSnapshot};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        matchmaking_interval: Duration::from_millis(50),
        ping_rate: Duration::from_millis(100),
        ..ServerConfig::default()
    }
}

async fn start_server(config: ServerConfig) -> SocketAddr {
    let server = Server::bind(config).await.expect("bind test server");
    let addr = server.local_addr().expect("local address");
    tokio::spawn(server.run());
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("connect to test server");
    client
}

async fn send(client: &mut Client, message: ClientMessage) {
    assert_ok!(client.send(Message::text(message.to_string())).await);
}

async fn send_raw(client: &mut Client, frame: &str) {
    assert_ok!(client.send(Message::text(frame.to_string())).await);
}

/// Next server message, skipping control frames. `None` once the server
/// has closed the connection.
async fn next_message(client: &mut Client) -> Option<ServerMessage> {
    loop {
        match client.next().await? {
            Ok(Message::Text(text)) => {
                return Some(ServerMessage::parse(text.as_str()).expect("server frames parse"))
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Reads until a message matches, failing the test after [`WAIT`].
async fn wait_for<F>(client: &mut Client, mut matches: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    timeout(WAIT, async {
        loop {
            match next_message(client).await {
                Some(message) if matches(&message) => return message,
                Some(_) => continue,
                None => panic!("connection closed while waiting"),
            }
        }
    })
    .await
    .expect("expected message in time")
}

async fn wait_for_world<F>(client: &mut Client, mut matches: F) -> WorldSnapshot
where
    F: FnMut(&WorldSnapshot) -> bool,
{
    match wait_for(client, |m| matches!(m, ServerMessage::World(s) if matches(s))).await {
        ServerMessage::World(snapshot) => snapshot,
        other => unreachable!("filtered for worlds, got {:?}", other),
    }
}

async fn hello(client: &mut Client, requested: Option<Uuid>) -> Uuid {
    send(client, ClientMessage::Hello(requested)).await;
    let first = timeout(WAIT, next_message(client))
        .await
        .expect("hello in time");
    match first {
        Some(ServerMessage::Hello(id)) => id,
        other => panic!("expected HELLO first, got {:?}", other),
    }
}

/// Two connected players that have both been put into the same game.
async fn matched_pair(addr: SocketAddr) -> (Client, Client, Uuid) {
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    hello(&mut first, None).await;
    hello(&mut second, None).await;

    send(&mut first, ClientMessage::Queue).await;
    send(&mut second, ClientMessage::Queue).await;

    let room_first = wait_for(&mut first, |m| matches!(m, ServerMessage::Game(_))).await;
    let room_second = wait_for(&mut second, |m| matches!(m, ServerMessage::Game(_))).await;
    assert_eq!(room_first, room_second);

    let ServerMessage::Game(room_id) = room_first else {
        unreachable!()
    };
    (first, second, room_id)
}

/// HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    /// Tests that an empty HELLO gets a newly generated player id
    #[tokio::test]
    async fn hello_assigns_fresh_identity() {
        let addr = start_server(test_config()).await;
        let mut client = connect(addr).await;

        let id = hello(&mut client, None).await;

        assert_ne!(id, Uuid::nil());
        wait_for(&mut client, |m| matches!(m, ServerMessage::Online(n) if *n >= 1)).await;
    }

    /// Tests that a requested player id is honored
    #[tokio::test]
    async fn hello_keeps_requested_identity() {
        let addr = start_server(test_config()).await;
        let mut client = connect(addr).await;
        let wanted = Uuid::new_v4();

        assert_eq!(hello(&mut client, Some(wanted)).await, wanted);
    }

    /// Tests that traffic before the handshake does not break it
    #[tokio::test]
    async fn messages_before_hello_are_ignored() {
        let addr = start_server(test_config()).await;
        let mut client = connect(addr).await;

        send(&mut client, ClientMessage::Queue).await;
        send_raw(&mut client, "garbage").await;

        hello(&mut client, None).await;
    }

    /// Tests that upgrades outside the WebSocket path are refused
    #[tokio::test]
    async fn upgrade_on_other_path_is_rejected() {
        let addr = start_server(test_config()).await;

        for path in ["", "/", "/other", "/ws/extra"] {
            let refused = connect_async(format!("ws://{}{}", addr, path)).await;
            match refused {
                Err(Error::Http(response)) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
                other => panic!("expected 404 for {:?}, got {:?}", path, other.map(|_| ())),
            }
        }

        // The proper path still works afterwards.
        let mut client = connect(addr).await;
        hello(&mut client, None).await;
    }

    /// Tests the handshake deadline for clients that never say HELLO
    #[tokio::test]
    async fn silent_client_is_dropped() {
        let addr = start_server(ServerConfig {
            handshake_timeout: Duration::from_millis(200),
            ..test_config()
        })
        .await;
        let mut client = connect(addr).await;

        let closed = timeout(WAIT, next_message(&mut client)).await;
        assert_eq!(closed.expect("server closes in time"), None);
    }

    /// Tests the ping timer and PONG handling on a live connection
    #[tokio::test]
    async fn server_pings_and_accepts_pong() {
        let addr = start_server(test_config()).await;
        let mut client = connect(addr).await;
        hello(&mut client, None).await;

        let ping = wait_for(&mut client, |m| matches!(m, ServerMessage::Ping { .. })).await;
        let ServerMessage::Ping { timestamp, .. } = ping else {
            unreachable!()
        };
        send(&mut client, ClientMessage::Pong { timestamp }).await;

        // The connection stays up and keeps pinging.
        wait_for(&mut client, |m| matches!(m, ServerMessage::Ping { .. })).await;
    }
}

/// GAME SESSION TESTS
mod session_tests {
    use super::*;

    /// Tests matchmaking and the initial mirrored snapshots
    #[tokio::test]
    async fn queued_players_are_matched_into_same_game() {
        let addr = start_server(test_config()).await;
        let (mut first, mut second, _room) = matched_pair(addr).await;

        let a = wait_for_world(&mut first, |_| true).await;
        let b = wait_for_world(&mut second, |_| true).await;

        // Both see themselves defending the bottom goal.
        assert_eq!(a.own, Position::new(400, 1120));
        assert_eq!(b.own, Position::new(400, 1120));
        assert_eq!(a.opponent, Position::new(400, 80));
        assert_eq!((a.own_goals, a.opponent_goals), (0, 0));
    }

    /// Tests paddle clamping and mirroring across both seats
    #[tokio::test]
    async fn paddle_move_is_mirrored_for_opponent() {
        let addr = start_server(test_config()).await;
        let (mut mover, mut watcher, _room) = matched_pair(addr).await;

        send_raw(&mut mover, "NOT_A_MESSAGE").await;
        send(&mut mover, ClientMessage::PlayerAction(Position::new(100, 100))).await;

        // Clamped to the mover's near half, then seen rotated by the opponent.
        let seen = wait_for_world(&mut watcher, |s| s.opponent == Position::new(700, 560)).await;
        assert_eq!(seen.own, Position::new(400, 1120));

        let own = wait_for_world(&mut mover, |s| s.own == Position::new(100, 640)).await;
        assert_eq!(own.opponent, Position::new(400, 80));
    }

    /// Tests a voluntary EXITGAME and requeueing afterwards
    #[tokio::test]
    async fn exit_game_notifies_opponent() {
        let addr = start_server(test_config()).await;
        let (mut leaver, mut stayer, _room) = matched_pair(addr).await;

        send(&mut leaver, ClientMessage::ExitGame("had enough".to_string())).await;

        let notice = wait_for(&mut stayer, |m| matches!(m, ServerMessage::ExitGame(_))).await;
        assert_eq!(notice, ServerMessage::ExitGame("Had enough".to_string()));
        wait_for(&mut leaver, |m| matches!(m, ServerMessage::ExitGame(_))).await;

        // Both are free to queue again and get a new game.
        send(&mut leaver, ClientMessage::Queue).await;
        send(&mut stayer, ClientMessage::Queue).await;
        wait_for(&mut leaver, |m| matches!(m, ServerMessage::Game(_))).await;
    }

    /// Tests that a dropped player ends the game for the opponent
    #[tokio::test]
    async fn disconnect_ends_game_for_opponent() {
        let addr = start_server(test_config()).await;
        let (mut leaver, mut stayer, _room) = matched_pair(addr).await;

        assert_ok!(leaver.close(None).await);

        let notice = wait_for(&mut stayer, |m| matches!(m, ServerMessage::ExitGame(_))).await;
        assert_eq!(
            notice,
            ServerMessage::ExitGame("Player disconnected".to_string())
        );
        wait_for(&mut stayer, |m| matches!(m, ServerMessage::Online(1))).await;
    }

    /// Tests that leaving the queue keeps a player out of matchmaking
    #[tokio::test]
    async fn unqueued_player_is_not_matched() {
        let addr = start_server(test_config()).await;
        let mut first = connect(addr).await;
        let mut second = connect(addr).await;
        let mut third = connect(addr).await;
        hello(&mut first, None).await;
        hello(&mut second, None).await;
        hello(&mut third, None).await;

        send(&mut first, ClientMessage::Queue).await;
        send(&mut first, ClientMessage::Unqueue).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        send(&mut second, ClientMessage::Queue).await;
        send(&mut third, ClientMessage::Queue).await;

        let second_room = wait_for(&mut second, |m| matches!(m, ServerMessage::Game(_))).await;
        let third_room = wait_for(&mut third, |m| matches!(m, ServerMessage::Game(_))).await;
        assert_eq!(second_room, third_room);

        // The first player only ever sees lobby traffic.
        let quiet = timeout(Duration::from_millis(300), async {
            loop {
                match next_message(&mut first).await {
                    Some(ServerMessage::Game(_)) => return true,
                    Some(_) => continue,
                    None => return false,
                }
            }
        })
        .await;
        assert!(!matches!(quiet, Ok(true)));
    }
}
