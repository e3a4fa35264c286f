//! Uniform block shared by the three compute passes.

use bytemuck::{Pod, Zeroable};

use crate::config::SimConfig;

/// Frame constants as laid out in the WGSL `FlockParams` uniform.
///
/// `vec3` members are padded to 16 bytes by the trailing scalar in each row.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FlockParams {
    pub world_min: [f32; 3],
    pub particle_count: u32,
    pub world_max: [f32; 3],
    pub bin_count: u32,
    pub grid_resolution: [u32; 3],
    pub obstacle_count: u32,

    pub delta_time: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    pub max_acceleration: f32,

    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub separation_dist: f32,

    pub alignment_dist: f32,
    pub cohesion_dist: f32,
    pub avoid_strength: f32,
    pub avoid_distance: f32,

    pub boundary_policy: u32,
    pub avoidance_enabled: u32,
    pub max_traversal: u32,
    pub _pad: u32,
}

impl FlockParams {
    pub const WGSL_STRUCT: &'static str = r#"
struct FlockParams {
    world_min: vec3<f32>,
    particle_count: u32,
    world_max: vec3<f32>,
    bin_count: u32,
    grid_resolution: vec3<u32>,
    obstacle_count: u32,
    delta_time: f32,
    speed_min: f32,
    speed_max: f32,
    max_acceleration: f32,
    separation_weight: f32,
    alignment_weight: f32,
    cohesion_weight: f32,
    separation_dist: f32,
    alignment_dist: f32,
    cohesion_dist: f32,
    avoid_strength: f32,
    avoid_distance: f32,
    boundary_policy: u32,
    avoidance_enabled: u32,
    max_traversal: u32,
    _pad: u32,
};
"#;

    pub fn from_config(config: &SimConfig) -> Self {
        let f = &config.flocking;
        let a = &config.avoidance;
        let enabled = a.enabled && !a.obstacles.is_empty() && a.distance > 0.0;
        Self {
            world_min: config.grid.world_min.to_array(),
            particle_count: config.particle_count,
            world_max: config.grid.world_max.to_array(),
            bin_count: config.grid.bin_count() as u32,
            grid_resolution: config.grid.resolution.to_array(),
            obstacle_count: a.obstacles.len() as u32,
            delta_time: config.effective_delta_time(),
            speed_min: config.speed_min,
            speed_max: config.speed_max,
            max_acceleration: config.max_acceleration,
            separation_weight: f.separation_weight,
            alignment_weight: f.alignment_weight,
            cohesion_weight: f.cohesion_weight,
            separation_dist: f.separation_dist,
            alignment_dist: f.alignment_dist,
            cohesion_dist: f.cohesion_dist,
            avoid_strength: a.strength,
            avoid_distance: a.distance,
            boundary_policy: config.boundary.to_gpu(),
            avoidance_enabled: enabled as u32,
            max_traversal: config.particle_count,
            _pad: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundaryPolicy;

    #[test]
    fn test_size_is_uniform_aligned() {
        assert_eq!(std::mem::size_of::<FlockParams>(), 112);
        assert_eq!(std::mem::size_of::<FlockParams>() % 16, 0);
    }

    #[test]
    fn test_from_config() {
        let config = SimConfig::new()
            .with_particle_count(123)
            .with_delta_time(0.5)
            .with_speed_multiplier(2.0)
            .with_boundary(BoundaryPolicy::Reflect);
        let params = FlockParams::from_config(&config);
        assert_eq!(params.particle_count, 123);
        assert_eq!(params.max_traversal, 123);
        assert_eq!(params.delta_time, 1.0);
        assert_eq!(params.boundary_policy, 1);
        assert_eq!(params.bin_count, 16 * 16 * 16);
        // avoidance is off without obstacles
        assert_eq!(params.avoidance_enabled, 0);
    }
}
