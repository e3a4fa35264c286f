//! Behavioral tests for the Interact and Move passes.

mod common;

use common::{assert_close, at_rest, brute_force, gpu_sim, still_config};
use flockgrid::prelude::*;
use flockgrid::{BoundaryPolicy, ComputeBackend, SimulationError, NO_OBSTACLE_DISTANCE};

fn crowded_config() -> SimConfig {
    // 4x4x4 bins of edge 2, so every radius fits in one bin.
    SimConfig::new()
        .with_particle_count(50)
        .with_world_bounds(Vec3::splat(-4.0), Vec3::splat(4.0))
        .with_grid_resolution(UVec3::splat(4))
        .with_birth_volume(Vec3::splat(-1.5), Vec3::splat(1.5))
        .with_seed(7)
}

/// Counts every particle whose grid-found neighbors differ from the
/// brute-force neighbors, and checks steering where they agree.
fn neighbor_mismatches<B: ComputeBackend>(sim: &mut FlockSimulation<B>, frames: usize) -> usize {
    let config = sim.config().clone();
    assert!(config.radii_covered());
    let mut mismatches = 0;
    for _ in 0..frames {
        sim.step().unwrap();
        let particles = sim.particles().unwrap();
        for (i, p) in particles.iter().enumerate() {
            let reference = brute_force(&config, &particles, i);
            if p.interaction_count != reference.interactions {
                mismatches += 1;
                continue;
            }
            let expected = reference.steering(&config.flocking, p.position, p.velocity);
            assert_close(p.pending_acceleration.x, expected.x, 1e-3);
            assert_close(p.pending_acceleration.y, expected.y, 1e-3);
            assert_close(p.pending_acceleration.z, expected.z, 1e-3);
        }
    }
    mismatches
}

#[test]
fn test_grid_neighbors_match_brute_force_cpu() {
    let mut sim = FlockSimulation::new_cpu(crowded_config()).unwrap();
    assert_eq!(neighbor_mismatches(&mut sim, 5), 0);
    assert!(sim.diagnostics().unwrap().interactions > 0);
}

#[test]
fn test_grid_neighbors_match_brute_force_gpu() {
    if let Some(mut sim) = gpu_sim(crowded_config()) {
        // Device float rounding may flip a pair sitting exactly on a radius.
        assert!(neighbor_mismatches(&mut sim, 5) <= 2);
    }
}

#[test]
fn test_steering_applies_next_frame() {
    let config = still_config(2, 4.0, 4);
    let mut sim = FlockSimulation::new_cpu(config).unwrap();
    let start = [Vec3::new(0.2, 0.0, 0.0), Vec3::new(-0.2, 0.0, 0.0)];
    sim.set_particles(&at_rest(&start)).unwrap();

    sim.step().unwrap();
    let first = sim.particles().unwrap();
    assert_eq!(first[0].position, start[0]);
    assert_eq!(first[1].position, start[1]);
    // Separation wins over cohesion at this distance.
    assert!(first[0].pending_acceleration.x > 0.0);
    assert!(first[1].pending_acceleration.x < 0.0);
    assert_eq!(first[0].interaction_count, 1);

    sim.step().unwrap();
    let second = sim.particles().unwrap();
    assert_eq!(second[0].acceleration, first[0].pending_acceleration);
    assert!(second[0].position.x > start[0].x);
    assert!(second[1].position.x < start[1].x);
}

#[test]
fn test_acceleration_is_clamped() {
    let config = still_config(1, 4.0, 4).with_max_acceleration(2.0);
    let mut sim = FlockSimulation::new_cpu(config).unwrap();
    let mut p = Particle::new(Vec3::ZERO, Vec3::ZERO, 0.1);
    p.pending_acceleration = Vec3::new(0.0, 100.0, 0.0);
    sim.set_particles(&[p]).unwrap();
    sim.step().unwrap();
    let q = sim.particles().unwrap()[0];
    assert_close(q.acceleration.length(), 2.0, 1e-5);
    assert_eq!(q.pending_acceleration, Vec3::ZERO);
}

fn boundary_run(policy: BoundaryPolicy) -> Particle {
    let config = still_config(1, 4.0, 4).with_delta_time(0.1).with_boundary(policy);
    let mut sim = FlockSimulation::new_cpu(config).unwrap();
    sim.set_particles(&[Particle::new(Vec3::new(3.9, 0.0, -3.95), Vec3::new(4.0, 0.0, -1.0), 0.1)])
        .unwrap();
    sim.step().unwrap();
    sim.particles().unwrap()[0]
}

#[test]
fn test_boundary_clamp() {
    let p = boundary_run(BoundaryPolicy::Clamp);
    assert_eq!(p.position.x, 4.0);
    assert_eq!(p.position.z, -4.0);
    assert_eq!(p.velocity.x, 0.0);
    assert_eq!(p.velocity.z, 0.0);
}

#[test]
fn test_boundary_reflect() {
    let p = boundary_run(BoundaryPolicy::Reflect);
    assert_eq!(p.position.x, 4.0);
    assert!(p.velocity.x < 0.0);
    assert!(p.velocity.z > 0.0);
}

#[test]
fn test_particles_never_leave_world() {
    let config = SimConfig::new()
        .with_particle_count(400)
        .with_world_bounds(Vec3::splat(-2.0), Vec3::splat(2.0))
        .with_grid_resolution(UVec3::splat(2))
        .with_speed_bounds(3.0, 6.0);
    let grid = config.grid;
    let mut sim = FlockSimulation::new_cpu(config).unwrap();
    for _ in 0..30 {
        sim.step().unwrap();
    }
    for p in sim.particles().unwrap() {
        assert!(grid.contains(p.position), "{:?} escaped", p.position);
        assert!(p.temperature >= 0.0 && p.temperature <= 1.0);
    }
}

fn avoidance_config() -> SimConfig {
    still_config(1, 8.0, 4).with_avoidance(
        4.0,
        2.0,
        vec![Obstacle::Sphere { center: Vec3::ZERO, radius: 1.0 }],
    )
}

fn heading_at_sphere() -> Particle {
    Particle::new(Vec3::new(-2.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0.1)
}

fn check_avoidance(p: &Particle) {
    assert_eq!(p.obstacle_id, 0);
    assert!(p.obstacle_distance > 1.0 && p.obstacle_distance < 2.0);
    assert!(p.repulsion > 0.0);
    assert!(p.march_iterations >= 1);
    assert_close(p.ray_length, p.obstacle_distance, 1e-2);
    assert_close(p.surface_normal.x, -1.0, 1e-3);
    assert!(p.pending_acceleration.x < 0.0);
}

#[test]
fn test_obstacle_repels_cpu() {
    let mut sim = FlockSimulation::new_cpu(avoidance_config()).unwrap();
    sim.set_particles(&[heading_at_sphere()]).unwrap();
    sim.step().unwrap();
    check_avoidance(&sim.particles().unwrap()[0]);
}

#[test]
fn test_obstacle_repels_gpu() {
    let Some(mut gpu) = gpu_sim(avoidance_config()) else {
        return;
    };
    gpu.set_particles(&[heading_at_sphere()]).unwrap();
    gpu.step().unwrap();
    let on_gpu = gpu.particles().unwrap()[0];
    check_avoidance(&on_gpu);

    let mut cpu = FlockSimulation::new_cpu(avoidance_config()).unwrap();
    cpu.set_particles(&[heading_at_sphere()]).unwrap();
    cpu.step().unwrap();
    let on_cpu = cpu.particles().unwrap()[0];
    assert_close(on_gpu.repulsion, on_cpu.repulsion, 1e-3);
    assert_close(on_gpu.position.x, on_cpu.position.x, 1e-5);
}

#[test]
fn test_avoidance_disabled_leaves_fields_clear() {
    let mut config = avoidance_config();
    config.avoidance.enabled = false;
    let mut sim = FlockSimulation::new_cpu(config).unwrap();
    sim.set_particles(&[heading_at_sphere()]).unwrap();
    sim.step().unwrap();
    let p = sim.particles().unwrap()[0];
    assert_eq!(p.obstacle_id, -1);
    assert_eq!(p.repulsion, 0.0);
    assert_eq!(p.obstacle_distance, NO_OBSTACLE_DISTANCE);
}

#[test]
fn test_no_obstacle_distance_matches_across_backends() {
    let mut config = avoidance_config();
    config.avoidance.enabled = false;
    let Some(mut gpu) = gpu_sim(config.clone()) else {
        return;
    };
    gpu.set_particles(&[heading_at_sphere()]).unwrap();
    gpu.step().unwrap();

    let mut cpu = FlockSimulation::new_cpu(config).unwrap();
    cpu.set_particles(&[heading_at_sphere()]).unwrap();
    cpu.step().unwrap();

    let on_gpu = gpu.particles().unwrap()[0];
    let on_cpu = cpu.particles().unwrap()[0];
    assert_eq!(on_gpu.obstacle_distance, on_cpu.obstacle_distance);
    assert_eq!(on_gpu.obstacle_id, on_cpu.obstacle_id);
}

#[test]
fn test_invalid_configs_keep_previous() {
    let good = crowded_config();
    let mut sim = FlockSimulation::new_cpu(good.clone()).unwrap();

    let too_many = vec![Obstacle::Sphere { center: Vec3::ZERO, radius: 0.1 }; 65];
    let bad = [
        good.clone().with_particle_count(0),
        good.clone().with_grid_resolution(UVec3::new(0, 4, 4)),
        good.clone().with_world_bounds(Vec3::splat(1.0), Vec3::splat(-1.0)),
        good.clone().with_speed_bounds(5.0, 1.0),
        good.clone().with_delta_time(0.0),
        good.clone().with_avoidance(1.0, 1.0, too_many),
    ];
    for config in bad {
        assert!(matches!(sim.reconfigure(config), Err(SimulationError::Config(_))));
        assert_eq!(sim.config(), &good);
    }
    assert!(sim.step().unwrap());
}

#[test]
fn test_reconfigure_weights_without_respawn() {
    let mut sim = FlockSimulation::new_cpu(crowded_config()).unwrap();
    sim.step().unwrap();
    let before = sim.particles().unwrap();

    let mut flocking = FlockingParams::default();
    flocking.cohesion_weight = 3.0;
    sim.reconfigure(crowded_config().with_flocking(flocking)).unwrap();
    assert_eq!(sim.particles().unwrap(), before);
    assert_eq!(sim.config().flocking.cohesion_weight, 3.0);
}

#[test]
fn test_advance_runs_due_frames() {
    let mut sim = FlockSimulation::new_cpu(crowded_config().with_delta_time(0.25)).unwrap();
    assert_eq!(sim.advance(0.6).unwrap(), 2);
    assert_eq!(sim.frame(), 2);
    sim.clock_mut().pause();
    assert_eq!(sim.advance(1.0).unwrap(), 0);
}
