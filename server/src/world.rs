//! Simulation state of a single game session.
//!
//! All coordinates are in the shared rink frame: seat A defends the bottom
//! goal and seat B the top one. Seat B's client sees the rink rotated by 180
//! degrees, so its input and snapshots are mirrored at this boundary and
//! nowhere else.

use log::info;
use shared::{
    rink_center, Position, Vector, WorldSnapshot, ENTITY_RADIUS, GAME_HEIGHT, GAME_WIDTH,
    GATES_HEIGHT, GATES_WIDTH,
};
use std::sync::OnceLock;

/// One of the two places at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    /// Defends the bottom goal; its view matches the shared frame.
    A,
    /// Defends the top goal; its view is mirrored.
    B,
}

impl Seat {
    pub fn opponent(&self) -> Seat {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }

    /// Converts a position between this seat's view and the shared frame.
    /// The mapping is its own inverse.
    pub fn to_shared(&self, pos: Position) -> Position {
        match self {
            Seat::A => pos,
            Seat::B => pos.flip(),
        }
    }
}

/// Straight piece of the boards the puck bounces off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub start: Vector,
    pub end: Vector,
    /// Unit normal pointing into the playing area.
    pub normal: Vector,
}

impl Wall {
    const fn new(start: Vector, end: Vector, normal: Vector) -> Self {
        Self { start, end, normal }
    }
}

/// The ten wall segments of the rink: the boards minus both goal mouths, plus
/// the side posts of each goal. Built once and shared by every world.
pub fn walls() -> &'static [Wall; 10] {
    static WALLS: OnceLock<[Wall; 10]> = OnceLock::new();
    WALLS.get_or_init(build_walls)
}

fn build_walls() -> [Wall; 10] {
    let w = GAME_WIDTH as f64;
    let h = GAME_HEIGHT as f64;
    let gate_left = (GAME_WIDTH / 2 - GATES_WIDTH / 2) as f64;
    let gate_right = (GAME_WIDTH / 2 + GATES_WIDTH / 2) as f64;
    let depth = GATES_HEIGHT as f64;

    let down = Vector::new(0.0, 1.0);
    let up = Vector::new(0.0, -1.0);
    let right = Vector::new(1.0, 0.0);
    let left = Vector::new(-1.0, 0.0);

    [
        // top boards
        Wall::new(Vector::new(0.0, 0.0), Vector::new(gate_left, 0.0), down),
        Wall::new(Vector::new(gate_right, 0.0), Vector::new(w, 0.0), down),
        // bottom boards
        Wall::new(Vector::new(0.0, h), Vector::new(gate_left, h), up),
        Wall::new(Vector::new(gate_right, h), Vector::new(w, h), up),
        // side boards
        Wall::new(Vector::new(0.0, 0.0), Vector::new(0.0, h), right),
        Wall::new(Vector::new(w, 0.0), Vector::new(w, h), left),
        // top goal posts
        Wall::new(Vector::new(gate_left, 0.0), Vector::new(gate_left, -depth), right),
        Wall::new(Vector::new(gate_right, 0.0), Vector::new(gate_right, -depth), left),
        // bottom goal posts
        Wall::new(Vector::new(gate_left, h), Vector::new(gate_left, h + depth), right),
        Wall::new(Vector::new(gate_right, h), Vector::new(gate_right, h + depth), left),
    ]
}

/// A paddle's latest position and the one before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub position: Position,
    pub previous: Position,
}

impl Paddle {
    fn at(position: Position) -> Self {
        Self {
            position,
            previous: position,
        }
    }

    fn move_to(&mut self, position: Position) {
        self.previous = self.position;
        self.position = position;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub paddle_a: Paddle,
    pub paddle_b: Paddle,
    pub puck_position: Vector,
    /// Rink units per millisecond.
    pub puck_velocity: Vector,
    pub goals_a: u32,
    pub goals_b: u32,
    walls: &'static [Wall; 10],
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Puck at rest in the center, both paddles in front of their goals.
    pub fn new() -> Self {
        Self {
            paddle_a: Paddle::at(Position::new(
                GAME_WIDTH / 2,
                GAME_HEIGHT - 2 * ENTITY_RADIUS,
            )),
            paddle_b: Paddle::at(Position::new(GAME_WIDTH / 2, 2 * ENTITY_RADIUS)),
            puck_position: rink_center(),
            puck_velocity: Vector::ZERO,
            goals_a: 0,
            goals_b: 0,
            walls: walls(),
        }
    }

    pub fn walls(&self) -> &'static [Wall; 10] {
        self.walls
    }

    pub fn paddle(&self, seat: Seat) -> &Paddle {
        match seat {
            Seat::A => &self.paddle_a,
            Seat::B => &self.paddle_b,
        }
    }

    /// Moves a paddle to where its player asked, given in that player's view.
    ///
    /// The request is clamped to the player's own half before it is mirrored
    /// into the shared frame. Returns the stored shared-frame position.
    pub fn set_paddle(&mut self, seat: Seat, requested: Position) -> Position {
        let shared = seat.to_shared(requested.clamp_to_near_half());
        match seat {
            Seat::A => self.paddle_a.move_to(shared),
            Seat::B => self.paddle_b.move_to(shared),
        }
        shared
    }

    /// Credits a goal and puts the puck back on the center spot.
    pub fn record_goal(&mut self, scorer: Seat) {
        match scorer {
            Seat::A => self.goals_a += 1,
            Seat::B => self.goals_b += 1,
        }
        self.reset_puck();
        info!(
            "Goal for seat {:?}, score is now {}:{}",
            scorer, self.goals_a, self.goals_b
        );
    }

    pub fn reset_puck(&mut self) {
        self.puck_position = rink_center();
        self.puck_velocity = Vector::ZERO;
    }

    pub fn goals(&self, seat: Seat) -> u32 {
        match seat {
            Seat::A => self.goals_a,
            Seat::B => self.goals_b,
        }
    }

    /// Whether either side has reached `max_goals`.
    pub fn is_finished(&self, max_goals: u32) -> bool {
        self.goals_a >= max_goals || self.goals_b >= max_goals
    }

    /// What the player in `seat` should see: its own paddle first, its own
    /// goals first, and the rink rotated so it always defends the bottom.
    pub fn snapshot_for(&self, seat: Seat) -> WorldSnapshot {
        let puck = Position::from_vector(self.puck_position);
        let opponent = seat.opponent();
        WorldSnapshot {
            own: seat.to_shared(self.paddle(seat).position),
            opponent: seat.to_shared(self.paddle(opponent).position),
            puck: seat.to_shared(puck),
            own_goals: self.goals(seat),
            opponent_goals: self.goals(opponent),
        }
    }
}
