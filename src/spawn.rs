//! Bulk particle allocation inside the birth volume.
//!
//! The particle store is only ever created wholesale: at startup and
//! whenever a configuration change alters the count or birth distribution.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::config::SimConfig;
use crate::particle::Particle;

/// Random helpers used while filling the particle store.
///
/// A single seeded RNG drives the whole spawn, so the same configuration
/// always produces the same initial flock.
pub struct SpawnContext {
    /// Index of the particle being spawned (0 to count-1).
    pub index: u32,
    /// Total number of particles being spawned.
    pub count: u32,
    rng: StdRng,
}

impl SpawnContext {
    pub fn new(count: u32, seed: u64) -> Self {
        Self { index: 0, count, rng: StdRng::seed_from_u64(seed) }
    }

    /// Normalized progress through the spawn (0.0 to 1.0).
    #[inline]
    pub fn progress(&self) -> f32 {
        self.index as f32 / self.count.max(1) as f32
    }

    /// Random f32 in `[min, max]`. Degenerate ranges return `min`.
    #[inline]
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        self.rng.gen_range(min..=max)
    }

    /// Uniform point inside an axis-aligned box.
    pub fn random_in_box(&mut self, min: Vec3, max: Vec3) -> Vec3 {
        Vec3::new(
            self.random_range(min.x, max.x),
            self.random_range(min.y, max.y),
            self.random_range(min.z, max.z),
        )
    }

    /// Uniform unit vector.
    pub fn random_direction(&mut self) -> Vec3 {
        let theta = self.rng.gen_range(0.0..TAU);
        let z: f32 = self.rng.gen_range(-1.0..=1.0);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    }
}

/// Allocate `config.particle_count` particles with randomized position,
/// heading, speed and size.
pub fn spawn_particles(config: &SimConfig) -> Vec<Particle> {
    let mut ctx = SpawnContext::new(config.particle_count, config.seed);
    (0..config.particle_count)
        .map(|i| {
            ctx.index = i;
            let position = ctx.random_in_box(config.birth_min, config.birth_max);
            let speed = ctx.random_range(config.speed_min, config.speed_max);
            let velocity = ctx.random_direction() * speed;
            let size = ctx.random_range(config.size_min, config.size_max);
            Particle::new(position, velocity, size)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_inside_birth_volume() {
        let config = SimConfig::new()
            .with_particle_count(500)
            .with_birth_volume(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 3.0, 4.0));
        let particles = spawn_particles(&config);
        assert_eq!(particles.len(), 500);
        for p in &particles {
            assert!(p.position.cmpge(config.birth_min).all());
            assert!(p.position.cmple(config.birth_max).all());
            let speed = p.velocity.length();
            assert!(speed >= config.speed_min - 1e-4 && speed <= config.speed_max + 1e-4);
            assert!(p.size >= config.size_min && p.size <= config.size_max);
        }
    }

    #[test]
    fn test_spawn_is_deterministic() {
        let config = SimConfig::new().with_particle_count(64).with_seed(7);
        assert_eq!(spawn_particles(&config), spawn_particles(&config));
        let other = spawn_particles(&config.clone().with_seed(8));
        assert_ne!(spawn_particles(&config), other);
    }

    #[test]
    fn test_degenerate_ranges() {
        let mut ctx = SpawnContext::new(1, 1);
        assert_eq!(ctx.random_range(2.0, 2.0), 2.0);
        assert_eq!(ctx.random_in_box(Vec3::ONE, Vec3::ONE), Vec3::ONE);
        assert!((ctx.random_direction().length() - 1.0).abs() < 1e-4);
    }
}
