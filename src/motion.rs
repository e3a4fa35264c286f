//! Per-particle integration used by the Move pass.

use glam::Vec3;

use crate::config::{BoundaryPolicy, SimConfig};
use crate::particle::Particle;
use crate::spatial::SpatialGrid;

/// Next motion state of one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionStep {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
}

/// Semi-implicit Euler step from the particle's committed state.
///
/// The steering left in `pending_acceleration` by the last Interact pass is
/// clamped to `max_acceleration` and becomes this step's acceleration.
pub fn integrate(particle: &Particle, config: &SimConfig) -> MotionStep {
    let dt = config.effective_delta_time();
    let acceleration = particle.pending_acceleration.clamp_length_max(config.max_acceleration);
    let mut velocity = bound_speed(
        particle.velocity + acceleration * dt,
        config.speed_min,
        config.speed_max,
    );
    let mut position = particle.position + velocity * dt;
    apply_boundary(&config.grid, config.boundary, &mut position, &mut velocity);

    MotionStep { position, velocity, acceleration }
}

/// Rescale `velocity` so its length lies in `[min, max]`. A zero velocity
/// that must speed up starts along +X.
pub fn bound_speed(velocity: Vec3, min: f32, max: f32) -> Vec3 {
    let speed = velocity.length();
    if speed > max {
        velocity * (max / speed)
    } else if speed < min {
        velocity.try_normalize().unwrap_or(Vec3::X) * min
    } else {
        velocity
    }
}

/// Keep `position` inside the world box.
pub fn apply_boundary(grid: &SpatialGrid, policy: BoundaryPolicy, position: &mut Vec3, velocity: &mut Vec3) {
    for axis in 0..3 {
        let (lo, hi) = (grid.world_min[axis], grid.world_max[axis]);
        if position[axis] < lo {
            position[axis] = lo;
            velocity[axis] = match policy {
                BoundaryPolicy::Clamp => velocity[axis].max(0.0),
                BoundaryPolicy::Reflect => velocity[axis].abs(),
            };
        } else if position[axis] > hi {
            position[axis] = hi;
            velocity[axis] = match policy {
                BoundaryPolicy::Clamp => velocity[axis].min(0.0),
                BoundaryPolicy::Reflect => -velocity[axis].abs(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    fn config() -> SimConfig {
        SimConfig::new()
            .with_world_bounds(Vec3::splat(-1.0), Vec3::splat(1.0))
            .with_grid_resolution(UVec3::splat(2))
            .with_speed_bounds(0.0, 10.0)
            .with_delta_time(0.1)
    }

    #[test]
    fn test_integrates_velocity_then_position() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::X, 0.1);
        p.pending_acceleration = Vec3::new(0.0, 1.0, 0.0);
        let step = integrate(&p, &config());
        assert!((step.velocity - Vec3::new(1.0, 0.1, 0.0)).length() < 1e-6);
        assert!((step.position - Vec3::new(0.1, 0.01, 0.0)).length() < 1e-6);
        assert_eq!(step.acceleration, Vec3::Y);
    }

    #[test]
    fn test_acceleration_is_clamped() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::ZERO, 0.1);
        p.pending_acceleration = Vec3::new(100.0, 0.0, 0.0);
        let step = integrate(&p, &config().with_max_acceleration(2.0));
        assert!((step.acceleration.length() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_speed_bounds() {
        assert!((bound_speed(Vec3::new(30.0, 40.0, 0.0), 0.0, 5.0).length() - 5.0).abs() < 1e-5);
        assert!((bound_speed(Vec3::new(0.1, 0.0, 0.0), 1.0, 5.0) - Vec3::X).length() < 1e-6);
        assert_eq!(bound_speed(Vec3::ZERO, 2.0, 5.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(bound_speed(Vec3::new(0.0, 3.0, 0.0), 1.0, 5.0), Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_clamp_policy_zeroes_outward_velocity() {
        let p = Particle::new(Vec3::new(0.95, 0.0, -0.95), Vec3::new(5.0, 1.0, -5.0), 0.1);
        let step = integrate(&p, &config());
        assert_eq!(step.position.x, 1.0);
        assert_eq!(step.position.z, -1.0);
        assert_eq!(step.velocity.x, 0.0);
        assert_eq!(step.velocity.z, 0.0);
        assert_eq!(step.velocity.y, 1.0);
    }

    #[test]
    fn test_reflect_policy_flips_outward_velocity() {
        let p = Particle::new(Vec3::new(0.95, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 0.1);
        let step = integrate(&p, &config().with_boundary(BoundaryPolicy::Reflect));
        assert_eq!(step.position.x, 1.0);
        assert_eq!(step.velocity.x, -5.0);
    }
}
