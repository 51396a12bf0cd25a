//! Text wire protocol shared by the server and its clients.
//!
//! Every message is a single WebSocket text frame of colon separated fields,
//! the first field being the message tag, e.g. `PLAYERACTION:400:900`.

use crate::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub const HELLO: &str = "HELLO";
pub const PING: &str = "PING";
pub const PONG: &str = "PONG";
pub const ONLINE: &str = "ONLINE";
pub const QUEUE: &str = "QUEUE";
pub const UNQUEUE: &str = "UNQUEUE";
pub const GAME: &str = "GAME";
pub const PLAYERACTION: &str = "PLAYERACTION";
pub const WORLD: &str = "WORLD";
pub const EXITGAME: &str = "EXITGAME";

const SEPARATOR: char = ':';

/// Why a frame could not be turned into a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,

    #[error("unknown message type `{0}`")]
    UnknownTag(String),

    #[error("message type `{0}` is not valid in this direction")]
    UnexpectedTag(String),

    #[error("`{tag}` is missing field `{field}`")]
    MissingField { tag: &'static str, field: &'static str },

    #[error("`{tag}` field `{field}` is not a number: `{value}`")]
    InvalidNumber {
        tag: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("invalid identifier `{0}`")]
    InvalidId(String),
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Handshake. `None` asks the server to mint a fresh player id.
    Hello(Option<Uuid>),
    /// Echo of the timestamp carried by the last `PING`.
    Pong { timestamp: i64 },
    Queue,
    Unqueue,
    /// Desired paddle position, in the sender's own view of the rink.
    PlayerAction(Position),
    ExitGame(String),
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Hello(Uuid),
    Ping { timestamp: i64, latency: u64 },
    Online(usize),
    /// A match was found and the session with this id has started.
    Game(Uuid),
    ExitGame(String),
    World(WorldSnapshot),
}

/// Per-recipient view of a running game.
///
/// `own` is always the recipient's paddle, drawn on the near (bottom) half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub own: Position,
    pub opponent: Position,
    pub puck: Position,
    pub own_goals: u32,
    pub opponent_goals: u32,
}

/// Capitalizes the first character, the way exit reasons are shown to players.
pub fn capitalize(reason: &str) -> String {
    let mut chars = reason.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct Fields<'a> {
    tag: &'static str,
    rest: Option<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(tag: &'static str, rest: Option<&'a str>) -> Self {
        Self { tag, rest }
    }

    fn next_raw(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        let rest = self.rest.ok_or(ParseError::MissingField {
            tag: self.tag,
            field,
        })?;
        match rest.split_once(SEPARATOR) {
            Some((head, tail)) => {
                self.rest = Some(tail);
                Ok(head)
            }
            None => {
                self.rest = None;
                Ok(rest)
            }
        }
    }

    /// Everything left, separators included.
    fn remainder(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        self.rest.take().ok_or(ParseError::MissingField {
            tag: self.tag,
            field,
        })
    }

    fn number<T: std::str::FromStr>(&mut self, field: &'static str) -> Result<T, ParseError> {
        let raw = self.next_raw(field)?;
        raw.trim().parse().map_err(|_| ParseError::InvalidNumber {
            tag: self.tag,
            field,
            value: raw.to_string(),
        })
    }

    fn uuid(&mut self, field: &'static str) -> Result<Uuid, ParseError> {
        let raw = self.next_raw(field)?;
        Uuid::parse_str(raw.trim()).map_err(|_| ParseError::InvalidId(raw.to_string()))
    }

    fn position(&mut self, x: &'static str, y: &'static str) -> Result<Position, ParseError> {
        Ok(Position::new(self.number(x)?, self.number(y)?))
    }
}

/// Splits a frame into its static tag and the unparsed remainder.
fn split_tag(body: &str) -> Result<(&'static str, Option<&str>), ParseError> {
    let body = body.trim_end_matches(['\r', '\n']);
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    let (tag, rest) = match body.split_once(SEPARATOR) {
        Some((tag, rest)) => (tag, Some(rest)),
        None => (body, None),
    };

    let tag = [
        HELLO,
        PING,
        PONG,
        ONLINE,
        QUEUE,
        UNQUEUE,
        GAME,
        PLAYERACTION,
        WORLD,
        EXITGAME,
    ]
    .into_iter()
    .find(|known| *known == tag)
    .ok_or_else(|| ParseError::UnknownTag(tag.to_string()))?;

    Ok((tag, rest))
}

impl ClientMessage {
    /// Parses a frame received from a client.
    pub fn parse(body: &str) -> Result<Self, ParseError> {
        let (tag, rest) = split_tag(body)?;
        let mut fields = Fields::new(tag, rest);

        match tag {
            HELLO => {
                let raw = fields.next_raw("player_id").unwrap_or("");
                if raw.trim().is_empty() {
                    Ok(ClientMessage::Hello(None))
                } else {
                    Uuid::parse_str(raw.trim())
                        .map(|id| ClientMessage::Hello(Some(id)))
                        .map_err(|_| ParseError::InvalidId(raw.to_string()))
                }
            }
            PONG => Ok(ClientMessage::Pong {
                timestamp: fields.number("timestamp")?,
            }),
            QUEUE => Ok(ClientMessage::Queue),
            UNQUEUE => Ok(ClientMessage::Unqueue),
            PLAYERACTION => Ok(ClientMessage::PlayerAction(fields.position("x", "y")?)),
            EXITGAME => Ok(ClientMessage::ExitGame(
                fields.remainder("reason").unwrap_or("").to_string(),
            )),
            other => Err(ParseError::UnexpectedTag(other.to_string())),
        }
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Hello(Some(id)) => write!(f, "{HELLO}:{id}"),
            ClientMessage::Hello(None) => write!(f, "{HELLO}:"),
            ClientMessage::Pong { timestamp } => write!(f, "{PONG}:{timestamp}"),
            ClientMessage::Queue => f.write_str(QUEUE),
            ClientMessage::Unqueue => f.write_str(UNQUEUE),
            ClientMessage::PlayerAction(pos) => write!(f, "{PLAYERACTION}:{}:{}", pos.x, pos.y),
            ClientMessage::ExitGame(reason) => write!(f, "{EXITGAME}:{reason}"),
        }
    }
}

impl ServerMessage {
    /// Builds an exit notification, capitalizing the reason.
    pub fn exit_game(reason: &str) -> Self {
        ServerMessage::ExitGame(capitalize(reason))
    }

    /// Parses a frame received from the server. Used by clients and tests.
    pub fn parse(body: &str) -> Result<Self, ParseError> {
        let (tag, rest) = split_tag(body)?;
        let mut fields = Fields::new(tag, rest);

        match tag {
            HELLO => Ok(ServerMessage::Hello(fields.uuid("player_id")?)),
            PING => Ok(ServerMessage::Ping {
                timestamp: fields.number("timestamp")?,
                latency: fields.number("latency")?,
            }),
            ONLINE => Ok(ServerMessage::Online(fields.number("count")?)),
            GAME => Ok(ServerMessage::Game(fields.uuid("room_id")?)),
            EXITGAME => Ok(ServerMessage::ExitGame(
                fields.remainder("reason").unwrap_or("").to_string(),
            )),
            WORLD => Ok(ServerMessage::World(WorldSnapshot {
                own: fields.position("own_x", "own_y")?,
                opponent: fields.position("opponent_x", "opponent_y")?,
                puck: fields.position("puck_x", "puck_y")?,
                own_goals: fields.number("own_goals")?,
                opponent_goals: fields.number("opponent_goals")?,
            })),
            other => Err(ParseError::UnexpectedTag(other.to_string())),
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Hello(id) => write!(f, "{HELLO}:{id}"),
            ServerMessage::Ping { timestamp, latency } => {
                write!(f, "{PING}:{timestamp}:{latency}")
            }
            ServerMessage::Online(count) => write!(f, "{ONLINE}:{count}"),
            ServerMessage::Game(room_id) => write!(f, "{GAME}:{room_id}"),
            ServerMessage::ExitGame(reason) => write!(f, "{EXITGAME}:{reason}"),
            ServerMessage::World(s) => write!(
                f,
                "{WORLD}:{}:{}:{}:{}:{}:{}:{}:{}",
                s.own.x,
                s.own.y,
                s.opponent.x,
                s.opponent.y,
                s.puck.x,
                s.puck.y,
                s.own_goals,
                s.opponent_goals
            ),
        }
    }
}
