use serde::{Deserialize, Serialize};

pub mod geometry;
pub mod protocol;

pub use geometry::{Intersection, Vector, EPSILON};
pub use protocol::{ClientMessage, ParseError, ServerMessage, WorldSnapshot};

pub const GAME_WIDTH: i32 = 800;
pub const GAME_HEIGHT: i32 = 1200;
pub const GATES_WIDTH: i32 = 300;
pub const GATES_HEIGHT: i32 = 80;
pub const ENTITY_RADIUS: i32 = 40;

/// Integer point in rink coordinates, as reported by clients and broadcast back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Rotates the position 180 degrees around the rink center, turning one
    /// player's view of the rink into the other's.
    pub fn flip(&self) -> Position {
        Position::new(GAME_WIDTH - self.x, GAME_HEIGHT - self.y)
    }

    /// Clamps a paddle request to the near (bottom) half of the rink, keeping
    /// the whole paddle inside the boards.
    pub fn clamp_to_near_half(&self) -> Position {
        Position::new(
            self.x.clamp(ENTITY_RADIUS, GAME_WIDTH - ENTITY_RADIUS),
            self.y
                .clamp(GAME_HEIGHT / 2 + ENTITY_RADIUS, GAME_HEIGHT - ENTITY_RADIUS),
        )
    }

    pub fn to_vector(&self) -> Vector {
        Vector::new(self.x as f64, self.y as f64)
    }

    /// Nearest integer position to a physics vector.
    pub fn from_vector(v: Vector) -> Position {
        Position::new(v.x.round() as i32, v.y.round() as i32)
    }
}

/// Center of the rink, where the puck is placed after every goal.
pub fn rink_center() -> Vector {
    Vector::new((GAME_WIDTH / 2) as f64, (GAME_HEIGHT / 2) as f64)
}
