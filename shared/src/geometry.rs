//! Planar vector math and the collision primitives used by the puck physics.
//!
//! Everything here is a pure function of [`Vector`] values. Comparisons
//! against zero go through [`EPSILON`] because all coordinates are floats.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Tolerance for every "is this zero" check in the geometry code.
pub const EPSILON: f64 = 0.000_000_1;

/// An immutable point or direction in rink space.
///
/// Used for both puck positions and puck velocities.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    /// Grows to the right.
    pub x: f64,
    /// Grows downwards, towards player A's end of the rink.
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector pointing from `from` to `to`.
    pub fn between(from: Vector, to: Vector) -> Self {
        to - from
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector with the same direction. A zero vector stays zero.
    pub fn normalize(&self) -> Vector {
        let len = self.length();
        if len < EPSILON {
            Vector::ZERO
        } else {
            Vector::new(self.x / len, self.y / len)
        }
    }

    /// Same direction, rescaled to `length`. A zero vector stays zero.
    pub fn with_length(&self, length: f64) -> Vector {
        self.normalize() * length
    }

    pub fn dot(&self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(&self, other: Vector) -> f64 {
        (*self - other).length()
    }

    /// Mirror this vector across a surface with unit normal `normal`:
    /// `v - 2 (v . n) n`.
    pub fn reflect(&self, normal: Vector) -> Vector {
        *self - normal * (2.0 * self.dot(normal))
    }

    pub fn lerp(&self, to: Vector, t: f64) -> Vector {
        Vector::new(lerp(self.x, to.x, t), lerp(self.y, to.y, t))
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, scalar: f64) -> Vector {
        Vector::new(self.x * scalar, self.y * scalar)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

/// Result of intersecting a line or segment with a circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    None,
    /// The line is tangent to the circle.
    One(Vector),
    Two(Vector, Vector),
}

impl Intersection {
    pub fn is_hit(&self) -> bool {
        !matches!(self, Intersection::None)
    }

    pub fn points(&self) -> Vec<Vector> {
        match *self {
            Intersection::None => Vec::new(),
            Intersection::One(a) => vec![a],
            Intersection::Two(a, b) => vec![a, b],
        }
    }

    fn from_points(points: &[Vector]) -> Self {
        match points {
            [] => Intersection::None,
            [a] => Intersection::One(*a),
            [a, b, ..] => Intersection::Two(*a, *b),
        }
    }
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Point on the line from `start` towards `end`, `distance` units from `start`.
///
/// The distance may exceed the segment length or be negative; the result then
/// lies on the extension of the segment. A degenerate segment yields `start`.
pub fn point_on_line(start: Vector, end: Vector, distance: f64) -> Vector {
    let len = start.distance(end);
    if len < EPSILON {
        return start;
    }
    start.lerp(end, distance / len)
}

/// Angle between two directed segments, folded into `[0, PI/2]`.
///
/// Only the acute angle matters when working out how far a circle travelled
/// past its first contact, so obtuse results are mirrored.
pub fn angle_between_lines(a1: Vector, b1: Vector, a2: Vector, b2: Vector) -> f64 {
    let first = b1 - a1;
    let second = b2 - a2;
    let denom = first.length() * second.length();
    if denom < EPSILON {
        return 0.0;
    }

    let cos = (first.dot(second) / denom).clamp(-1.0, 1.0);
    let angle = cos.acos();
    if angle > std::f64::consts::FRAC_PI_2 {
        std::f64::consts::PI - angle
    } else {
        angle
    }
}

/// Coefficients `(a, b, c)` of the line `a*x + b*y + c = 0` through two points.
pub fn line_from_points(start: Vector, end: Vector) -> (f64, f64, f64) {
    let a = start.y - end.y;
    let b = end.x - start.x;
    let c = end.x * start.y - start.x * end.y;
    (a, b, -c)
}

/// Perpendicular distance from `point` to the infinite line through `start` and `end`.
pub fn point_line_distance(point: Vector, start: Vector, end: Vector) -> f64 {
    let (a, b, c) = line_from_points(start, end);
    let norm = (a * a + b * b).sqrt();
    if norm < EPSILON {
        return point.distance(start);
    }
    (a * point.x + b * point.y + c).abs() / norm
}

/// Whether `target` lies on the segment, by the triangle equality
/// `|start,target| + |target,end| == |start,end|`.
pub fn point_on_segment(start: Vector, end: Vector, target: Vector) -> bool {
    start.distance(target) + target.distance(end) - start.distance(end) < EPSILON
}

/// Whichever of `a` and `b` is nearer to `target`.
pub fn closest_point(a: Vector, b: Vector, target: Vector) -> Vector {
    if a.distance(target) < b.distance(target) {
        a
    } else {
        b
    }
}

/// Intersections of the infinite line through `start` and `end` with a circle.
pub fn line_circle_intersection(
    start: Vector,
    end: Vector,
    center: Vector,
    radius: f64,
) -> Intersection {
    if start.distance(end) < EPSILON {
        return Intersection::None;
    }

    // Line in the form a*x + b*y = c.
    let (a, b, c) = line_from_points(start, end);
    let c = -c;

    if b.abs() < EPSILON {
        // Vertical line: x is fixed, solve for y directly.
        let x = c / a;
        let dx = (x - center.x).abs();
        if dx > radius + EPSILON {
            return Intersection::None;
        }
        if (dx - radius).abs() < EPSILON {
            return Intersection::One(Vector::new(x, center.y));
        }
        let dy = (radius * radius - dx * dx).sqrt();
        return Intersection::Two(
            Vector::new(x, center.y + dy),
            Vector::new(x, center.y - dy),
        );
    }

    // Substitute y = (c - a*x) / b into the circle equation.
    let qa = a * a + b * b;
    let qb = 2.0 * a * b * center.y - 2.0 * a * c - 2.0 * b * b * center.x;
    let qc = b * b * center.x * center.x + b * b * center.y * center.y
        - 2.0 * b * c * center.y
        + c * c
        - b * b * radius * radius;
    let discriminant = qb * qb - 4.0 * qa * qc;

    let y_at = |x: f64| (c - a * x) / b;

    if discriminant.abs() < EPSILON {
        let x = -qb / (2.0 * qa);
        Intersection::One(Vector::new(x, y_at(x)))
    } else if discriminant < 0.0 {
        Intersection::None
    } else {
        let root = discriminant.sqrt();
        let x1 = (-qb + root) / (2.0 * qa);
        let x2 = (-qb - root) / (2.0 * qa);
        Intersection::Two(Vector::new(x1, y_at(x1)), Vector::new(x2, y_at(x2)))
    }
}

/// Like [`line_circle_intersection`] but keeps only points on the segment.
pub fn segment_circle_intersection(
    start: Vector,
    end: Vector,
    center: Vector,
    radius: f64,
) -> Intersection {
    let hits: Vec<Vector> = line_circle_intersection(start, end, center, radius)
        .points()
        .into_iter()
        .filter(|hit| point_on_segment(start, end, *hit))
        .collect();

    Intersection::from_points(&hits)
}

/// Intersection of the infinite lines `a-b` and `c-d`.
pub fn line_line_intersection(a: Vector, b: Vector, c: Vector, d: Vector) -> Option<Vector> {
    if a.distance(b) < EPSILON || c.distance(d) < EPSILON {
        return None;
    }

    let denom = (d.y - c.y) * (b.x - a.x) - (d.x - c.x) * (b.y - a.y);
    if denom.abs() < EPSILON {
        return None;
    }

    let ua = ((d.x - c.x) * (a.y - c.y) - (d.y - c.y) * (a.x - c.x)) / denom;
    Some(Vector::new(a.x + ua * (b.x - a.x), a.y + ua * (b.y - a.y)))
}

/// Intersection of the segments `a-b` and `c-d`.
///
/// Parallel and collinear segments never intersect. Both interpolation
/// parameters are range-checked against the sign of the denominator so no
/// division happens until a hit is certain.
pub fn segment_segment_intersection(
    a: Vector,
    b: Vector,
    c: Vector,
    d: Vector,
) -> Option<Vector> {
    if a.distance(b) < EPSILON || c.distance(d) < EPSILON {
        return None;
    }

    let first = b - a;
    let second = d - c;

    let denom = first.x * second.y - second.x * first.y;
    if denom.abs() < EPSILON {
        return None;
    }
    let positive = denom > 0.0;

    let offset = a - c;

    // Parameter along `c-d`, scaled by denom.
    let s = first.x * offset.y - first.y * offset.x;
    if (s < 0.0) == positive {
        return None;
    }

    // Parameter along `a-b`, scaled by denom.
    let t = second.x * offset.y - second.y * offset.x;
    if (t < 0.0) == positive {
        return None;
    }

    if (s > denom) == positive || (t > denom) == positive {
        return None;
    }

    Some(a + first * (t / denom))
}
