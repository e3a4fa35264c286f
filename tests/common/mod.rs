//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use flockgrid::prelude::*;
use flockgrid::steering::FlockAccumulator;

/// Simulation on the GPU, or `None` when the machine has no adapter.
pub fn gpu_sim(config: SimConfig) -> Option<FlockSimulation<GpuBackend>> {
    match GpuContext::new_blocking() {
        Ok(context) => Some(FlockSimulation::with_backend(config, GpuBackend::new(context)).unwrap()),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

/// World of `[-half, half]^3` split into `res^3` bins, particles at rest.
pub fn still_config(count: u32, half: f32, res: u32) -> SimConfig {
    SimConfig::new()
        .with_particle_count(count)
        .with_world_bounds(Vec3::splat(-half), Vec3::splat(half))
        .with_grid_resolution(UVec3::splat(res))
        .with_speed_bounds(0.0, 4.0)
}

pub fn at_rest(positions: &[Vec3]) -> Vec<Particle> {
    positions.iter().map(|&p| Particle::new(p, Vec3::ZERO, 0.1)).collect()
}

/// O(n^2) reference for the Interact pass: every other particle is a
/// candidate, no grid involved.
pub fn brute_force(config: &SimConfig, particles: &[Particle], i: usize) -> FlockAccumulator {
    let me = &particles[i];
    let mut acc = FlockAccumulator::default();
    for (j, other) in particles.iter().enumerate() {
        if j != i {
            acc.add_neighbor(&config.flocking, me.position, other.position, other.velocity);
        }
    }
    acc
}

/// Absolute tolerance, scaled up for large magnitudes.
pub fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance * scale,
        "expected {} to be within {} of {}",
        actual,
        tolerance * scale,
        expected
    );
}
