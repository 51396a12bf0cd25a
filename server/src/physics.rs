//! Continuous collision physics for the puck.
//!
//! The puck is swept along its travel segment every tick, so it cannot tunnel
//! through a wall or a paddle no matter how far it moves in one step. Each
//! tick resolves at most one collision: walls first, in [`walls`] order, then
//! paddle A, then paddle B. The first hit wins.
//!
//! [`walls`]: crate::world::walls

use crate::config::PhysicsConfig;
use crate::world::{Paddle, Seat, Wall, World};
use shared::geometry::{
    angle_between_lines, line_line_intersection, point_on_line, point_on_segment,
    segment_circle_intersection, segment_segment_intersection,
};
use shared::{Vector, ENTITY_RADIUS, EPSILON, GAME_HEIGHT, GATES_HEIGHT};
use std::f64::consts::FRAC_PI_2;
use std::time::Duration;

const RADIUS: f64 = ENTITY_RADIUS as f64;

/// What happened to the puck during one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Free movement with drag applied.
    Moved,
    WallHit,
    PaddleHit(Seat),
    Goal { scorer: Seat, match_over: bool },
}

/// Where the puck ends up after touching something, and its new velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounce {
    position: Vector,
    velocity: Vector,
}

pub struct PhysicsEngine {
    config: PhysicsConfig,
}

impl PhysicsEngine {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Advances the puck by `elapsed`.
    pub fn step(&self, world: &mut World, elapsed: Duration) -> TickOutcome {
        let dt = elapsed.as_secs_f64() * 1000.0;
        if dt < EPSILON {
            return TickOutcome::Moved;
        }

        let from = world.puck_position;
        let to = from + world.puck_velocity * dt;

        if let Some(bounce) = self.detect_wall_hit(world.walls(), from, to, world.puck_velocity) {
            world.puck_position = bounce.position;
            world.puck_velocity = bounce.velocity;
            return TickOutcome::WallHit;
        }

        for seat in [Seat::A, Seat::B] {
            let paddle = *world.paddle(seat);
            if let Some(bounce) = self.detect_paddle_hit(&paddle, from, to, world.puck_velocity, dt)
            {
                world.puck_position = bounce.position;
                world.puck_velocity = self.clamp_speed(bounce.velocity);
                return TickOutcome::PaddleHit(seat);
            }
        }

        world.puck_position = to;
        world.puck_velocity = world.puck_velocity * (1.0 - self.config.drag);

        if let Some(scorer) = detect_goal(world.puck_position) {
            world.record_goal(scorer);
            return TickOutcome::Goal {
                scorer,
                match_over: world.is_finished(self.config.max_goals),
            };
        }

        TickOutcome::Moved
    }

    /// Limits a velocity to the configured maximum speed, keeping its direction.
    pub fn clamp_speed(&self, velocity: Vector) -> Vector {
        if velocity.length() <= self.config.max_puck_speed {
            velocity
        } else {
            velocity.with_length(self.config.max_puck_speed)
        }
    }

    fn detect_wall_hit(
        &self,
        walls: &[Wall],
        from: Vector,
        to: Vector,
        velocity: Vector,
    ) -> Option<Bounce> {
        for wall in walls {
            // The puck center crossed the wall during this step.
            if let Some(crossing) = segment_segment_intersection(wall.start, wall.end, to, from) {
                let angle = angle_between_lines(to, from, wall.start, wall.end);
                let position = self
                    .contact_point(crossing, from, angle, from, to)
                    .unwrap_or_else(|| self.push_out(wall, to));
                return Some(Bounce {
                    position,
                    velocity: velocity.reflect(wall.normal),
                });
            }

            // The center stayed clear but the rim overlaps the wall.
            if segment_circle_intersection(wall.start, wall.end, to, RADIUS).is_hit() {
                let position = line_line_intersection(to, from, wall.start, wall.end)
                    .and_then(|crossing| {
                        let angle = angle_between_lines(from, to, wall.start, wall.end);
                        self.contact_point(crossing, to, angle, from, to)
                    })
                    .unwrap_or_else(|| self.push_out(wall, to));

                let velocity = if velocity.dot(wall.normal) < 0.0 {
                    velocity.reflect(wall.normal)
                } else {
                    velocity
                };
                return Some(Bounce { position, velocity });
            }
        }

        None
    }

    /// Walks back from where the travel line meets the wall line towards
    /// `towards` until the rim, not the center, touches the wall.
    ///
    /// Returns `None` when that point is not on this step's travel segment,
    /// i.e. the puck was already overlapping the wall before the step.
    fn contact_point(
        &self,
        crossing: Vector,
        towards: Vector,
        angle: f64,
        from: Vector,
        to: Vector,
    ) -> Option<Vector> {
        let reach = if (angle - FRAC_PI_2).abs() < EPSILON {
            RADIUS
        } else {
            let sin = angle.sin();
            if sin < EPSILON {
                return None;
            }
            RADIUS / sin
        };

        let point = point_on_line(crossing, towards, reach + self.config.collision_distance);
        point_on_segment(from, to, point).then_some(point)
    }

    /// Moves the puck along the wall normal until it is clear of the wall line.
    fn push_out(&self, wall: &Wall, position: Vector) -> Vector {
        let depth = (position - wall.start).dot(wall.normal);
        position + wall.normal * (RADIUS + self.config.collision_distance - depth)
    }

    fn detect_paddle_hit(
        &self,
        paddle: &Paddle,
        from: Vector,
        to: Vector,
        velocity: Vector,
        dt: f64,
    ) -> Option<Bounce> {
        let paddle_from = paddle.previous.to_vector();
        let paddle_to = paddle.position.to_vector();
        let paddle_velocity = (paddle_to - paddle_from) * (1.0 / dt);

        let contact = if paddle_to.distance(to) < 2.0 * RADIUS {
            paddle_to
        } else {
            segment_segment_intersection(paddle_from, paddle_to, from, to)?
        };

        let normal = hit_direction(contact, from, to, paddle_velocity);
        let result = velocity.reflect(normal) + paddle_velocity;
        if result.length() < EPSILON {
            return None;
        }

        Some(Bounce {
            position: contact + normal * (2.0 * RADIUS + self.config.collision_distance),
            velocity: result,
        })
    }
}

/// Unit direction from the contact point to the puck. Falls back to other
/// cues when the puck sits exactly on the contact point.
fn hit_direction(contact: Vector, from: Vector, to: Vector, paddle_velocity: Vector) -> Vector {
    [to - contact, from - contact, paddle_velocity]
        .into_iter()
        .map(|v| v.normalize())
        .find(|v| v.length() > EPSILON)
        .unwrap_or(Vector::new(0.0, -1.0))
}

/// Which seat scored, if the puck is fully inside a goal.
///
/// The top goal is defended by seat B, so a puck there is a point for seat A.
pub fn detect_goal(position: Vector) -> Option<Seat> {
    if position.y - RADIUS < -(GATES_HEIGHT as f64) {
        Some(Seat::A)
    } else if position.y + RADIUS > (GAME_HEIGHT + GATES_HEIGHT) as f64 {
        Some(Seat::B)
    } else {
        None
    }
}
