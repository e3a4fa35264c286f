//! Flocking and avoidance rules shared by the CPU backend, the WGSL
//! Interact pass and the brute-force test oracle.

use glam::Vec3;

use crate::config::{AvoidanceParams, FlockingParams};
use crate::obstacle::{self, Obstacle};
use crate::particle::NO_OBSTACLE_DISTANCE;

/// Neighbors closer than this are ignored by separation.
pub const MIN_SEPARATION: f32 = 1.0e-6;
/// Sphere-tracing step budget for the heading ray.
pub const MAX_MARCH_STEPS: u32 = 16;
/// Ray hits when the field drops below this.
pub const HIT_EPSILON: f32 = 1.0e-3;
/// Neighbor count at which crowding saturates the temperature.
const CROWD_SATURATION: f32 = 8.0;

/// Running sums for one particle's flocking neighborhood.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlockAccumulator {
    pub separation: Vec3,
    pub alignment_sum: Vec3,
    pub alignment_count: u32,
    pub cohesion_sum: Vec3,
    pub cohesion_count: u32,
    /// Neighbors inside at least one radius.
    pub interactions: u32,
}

impl FlockAccumulator {
    /// Fold one neighbor into the sums. Callers exclude the particle itself.
    #[inline]
    pub fn add_neighbor(
        &mut self,
        params: &FlockingParams,
        position: Vec3,
        neighbor_position: Vec3,
        neighbor_velocity: Vec3,
    ) {
        let offset = neighbor_position - position;
        let dist = offset.length();
        let mut counted = false;

        if dist < params.separation_dist && dist > MIN_SEPARATION {
            self.separation -= offset / (dist * dist);
            counted = true;
        }
        if dist < params.alignment_dist {
            self.alignment_sum += neighbor_velocity;
            self.alignment_count += 1;
            counted = true;
        }
        if dist < params.cohesion_dist {
            self.cohesion_sum += neighbor_position;
            self.cohesion_count += 1;
            counted = true;
        }
        if counted {
            self.interactions += 1;
        }
    }

    /// Weighted sum of the three steering terms.
    pub fn steering(&self, params: &FlockingParams, position: Vec3, velocity: Vec3) -> Vec3 {
        let mut steer = self.separation * params.separation_weight;
        if self.alignment_count > 0 {
            let heading = self.alignment_sum / self.alignment_count as f32;
            steer += (heading - velocity) * params.alignment_weight;
        }
        if self.cohesion_count > 0 {
            let centroid = self.cohesion_sum / self.cohesion_count as f32;
            steer += (centroid - position) * params.cohesion_weight;
        }
        steer
    }
}

/// Result of probing the obstacle field around one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Avoidance {
    pub distance: f32,
    pub obstacle_id: Option<usize>,
    pub normal: Vec3,
    pub repulsion: f32,
    pub iterations: u32,
    pub ray_length: f32,
}

impl Avoidance {
    pub fn none() -> Self {
        Self {
            distance: NO_OBSTACLE_DISTANCE,
            obstacle_id: None,
            normal: Vec3::ZERO,
            repulsion: 0.0,
            iterations: 0,
            ray_length: 0.0,
        }
    }

    pub fn acceleration(&self) -> Vec3 {
        self.normal * self.repulsion
    }
}

/// Probe the obstacle field at `position` and along the heading.
///
/// The push is `strength * (1 - closest / distance)` along the surface
/// normal, where `closest` is the smaller of the surface distance and the
/// heading ray length.
pub fn avoid(params: &AvoidanceParams, obstacles: &[Obstacle], position: Vec3, velocity: Vec3) -> Avoidance {
    if !params.enabled || params.distance <= 0.0 {
        return Avoidance::none();
    }
    let nearest = obstacle::nearest(obstacles, position);
    if nearest.id.is_none() {
        return Avoidance::none();
    }

    let normal = obstacle::surface_normal(obstacles, position);

    let (iterations, ray_length) = match velocity.try_normalize() {
        Some(dir) => march(obstacles, position, dir, params.distance),
        None => (0, params.distance),
    };

    let closest = nearest.distance.min(ray_length);
    let repulsion = if closest < params.distance {
        params.strength * (1.0 - closest / params.distance)
    } else {
        0.0
    };

    Avoidance {
        distance: nearest.distance,
        obstacle_id: nearest.id,
        normal,
        repulsion,
        iterations,
        ray_length,
    }
}

/// Sphere-trace from `origin` along `dir` up to `max_distance`.
fn march(obstacles: &[Obstacle], origin: Vec3, dir: Vec3, max_distance: f32) -> (u32, f32) {
    let mut t = 0.0;
    let mut iterations = 0;
    while iterations < MAX_MARCH_STEPS {
        let d = obstacle::nearest(obstacles, origin + dir * t).distance;
        iterations += 1;
        if d < HIT_EPSILON {
            break;
        }
        t += d;
        if t >= max_distance {
            break;
        }
    }
    (iterations, t.min(max_distance))
}

/// Cosmetic heat: mostly normalized speed, partly neighborhood crowding.
pub fn temperature(speed: f32, speed_min: f32, speed_max: f32, interactions: u32) -> f32 {
    let span = speed_max - speed_min;
    let speed_norm = if span > 0.0 { (speed - speed_min) / span } else { 0.0 };
    let crowd = (interactions as f32 / CROWD_SATURATION).min(1.0);
    (0.75 * speed_norm + 0.25 * crowd).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FlockingParams {
        FlockingParams {
            separation_weight: 1.0,
            separation_dist: 1.0,
            alignment_weight: 1.0,
            alignment_dist: 2.0,
            cohesion_weight: 1.0,
            cohesion_dist: 3.0,
        }
    }

    #[test]
    fn test_separation_pushes_away() {
        let p = params();
        let mut acc = FlockAccumulator::default();
        acc.add_neighbor(&p, Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO);
        // -offset / dist^2 = -(0.5) / 0.25 = -2
        assert!((acc.separation - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);
        assert_eq!(acc.interactions, 1);
    }

    #[test]
    fn test_radii_are_independent() {
        let p = params();
        let mut acc = FlockAccumulator::default();
        acc.add_neighbor(&p, Vec3::ZERO, Vec3::new(2.5, 0.0, 0.0), Vec3::Y);
        assert_eq!(acc.separation, Vec3::ZERO);
        assert_eq!(acc.alignment_count, 0);
        assert_eq!(acc.cohesion_count, 1);
        acc.add_neighbor(&p, Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::Y);
        assert_eq!(acc.interactions, 1);
    }

    #[test]
    fn test_steering_combines_terms() {
        let p = params();
        let mut acc = FlockAccumulator::default();
        acc.add_neighbor(&p, Vec3::ZERO, Vec3::new(1.5, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        let steer = acc.steering(&p, Vec3::ZERO, Vec3::ZERO);
        // alignment (0,2,0) + cohesion (1.5,0,0)
        assert!((steer - Vec3::new(1.5, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_coincident_neighbor_skips_separation() {
        let p = params();
        let mut acc = FlockAccumulator::default();
        acc.add_neighbor(&p, Vec3::ONE, Vec3::ONE, Vec3::ZERO);
        assert_eq!(acc.separation, Vec3::ZERO);
        assert!(acc.steering(&p, Vec3::ONE, Vec3::ZERO).is_finite());
    }

    #[test]
    fn test_avoid_disabled() {
        let params = AvoidanceParams::default();
        let obstacles = [Obstacle::Sphere { center: Vec3::ZERO, radius: 1.0 }];
        assert_eq!(avoid(&params, &obstacles, Vec3::new(1.5, 0.0, 0.0), Vec3::X), Avoidance::none());
    }

    #[test]
    fn test_avoid_pushes_out_of_obstacle() {
        let params = AvoidanceParams { enabled: true, strength: 2.0, distance: 1.0, obstacles: Vec::new() };
        let obstacles = [Obstacle::Sphere { center: Vec3::ZERO, radius: 1.0 }];
        let a = avoid(&params, &obstacles, Vec3::new(0.0, 1.5, 0.0), Vec3::X);
        assert_eq!(a.obstacle_id, Some(0));
        assert!((a.distance - 0.5).abs() < 1e-5);
        assert!((a.repulsion - 1.0).abs() < 1e-3);
        assert!(a.acceleration().y > 0.0);
        assert!(a.iterations >= 1);
    }

    #[test]
    fn test_heading_ray_sees_obstacle_ahead() {
        let params = AvoidanceParams { enabled: true, strength: 1.0, distance: 4.0, obstacles: Vec::new() };
        let obstacles = [Obstacle::Sphere { center: Vec3::new(3.0, 0.0, 0.0), radius: 1.0 }];
        let toward = avoid(&params, &obstacles, Vec3::ZERO, Vec3::X);
        let away = avoid(&params, &obstacles, Vec3::ZERO, -Vec3::X);
        assert!(toward.ray_length < 2.1);
        assert_eq!(away.ray_length, 4.0);
        assert!(toward.repulsion >= away.repulsion);
    }

    #[test]
    fn test_temperature_range() {
        assert_eq!(temperature(0.0, 1.0, 2.0, 0), 0.0);
        assert_eq!(temperature(2.0, 1.0, 2.0, 100), 1.0);
        assert!((temperature(1.5, 1.0, 2.0, 4) - 0.5).abs() < 1e-6);
    }
}
