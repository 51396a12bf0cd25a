//! Performance benchmarks for the simulation hot paths

use assert_approx_eq::assert_approx_eq;
use server::config::PhysicsConfig;
use server::physics::PhysicsEngine;
use server::world::{Seat, World};
use shared::geometry::{segment_circle_intersection, segment_segment_intersection};
use shared::{ClientMessage, Position, ServerMessage, Vector};
use std::time::{Duration, Instant};

/// Benchmarks the segment intersection used for every wall on every tick
#[test]
fn benchmark_segment_intersection() {
    let iterations = 100_000;
    let start = Instant::now();
    let mut hits = 0;

    for i in 0..iterations {
        let offset = (i % 100 + 1) as f64;
        if segment_segment_intersection(
            Vector::new(0.0, 0.0),
            Vector::new(250.0, 0.0),
            Vector::new(offset, -20.0),
            Vector::new(offset, 20.0),
        )
        .is_some()
        {
            hits += 1;
        }
        let _ = segment_circle_intersection(
            Vector::new(0.0, 0.0),
            Vector::new(0.0, 1200.0),
            Vector::new(offset, 600.0),
            40.0,
        );
    }

    let duration = start.elapsed();
    println!(
        "Segment intersection: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(hits, iterations);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full physics steps with moving paddles
#[test]
fn benchmark_physics_step() {
    let engine = PhysicsEngine::new(PhysicsConfig::default());
    let mut world = World::new();
    world.puck_velocity = Vector::new(1.3, -1.1);

    let tick = Duration::from_millis(20);
    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let sweep = (i % 720) as i32;
        world.set_paddle(Seat::A, Position::new(40 + sweep, 900));
        world.set_paddle(Seat::B, Position::new(760 - sweep, 900));
        engine.step(&mut world, tick);
    }

    let duration = start.elapsed();
    println!(
        "Physics step: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(world.puck_velocity.length() <= engine.config().max_puck_speed + 1e-9);
    assert!(duration.as_millis() < 2000);
}

/// A free-moving puck loses speed to drag only
#[test]
fn drag_only_motion_decays_geometrically() {
    let engine = PhysicsEngine::new(PhysicsConfig::default());
    let mut world = World::new();
    world.puck_velocity = Vector::new(0.01, 0.0);

    let iterations = 100;
    for _ in 0..iterations {
        engine.step(&mut world, Duration::from_millis(1));
    }

    let expected = 0.01 * (1.0 - PhysicsConfig::default().drag).powi(iterations);
    assert_approx_eq!(world.puck_velocity.x, expected, 1e-12);
}

/// Benchmarks the text codec on the two most frequent frames
#[test]
fn benchmark_codec() {
    let iterations = 100_000;
    let world = World::new().snapshot_for(Seat::B);
    let start = Instant::now();

    for i in 0..iterations {
        let frame = ServerMessage::World(world).to_string();
        assert!(frame.starts_with("WORLD:"));

        let action = format!("PLAYERACTION:{}:{}", i % 800, i % 1200);
        assert!(matches!(
            ClientMessage::parse(&action),
            Ok(ClientMessage::PlayerAction(_))
        ));
    }

    let duration = start.elapsed();
    println!(
        "Codec: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}
