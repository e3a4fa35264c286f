//! The particle store record and its instance view.
//!
//! [`Particle`] is laid out to match the WGSL `Particle` struct used by the
//! compute shaders byte for byte, so the same `Vec<Particle>` can be uploaded
//! to a storage buffer, read back for debugging, or bound as an instance
//! vertex buffer.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Sentinel stored in `obstacle_id` when no obstacle is near.
pub const NO_OBSTACLE: i32 = -1;
/// `obstacle_distance` when no obstacle is in range. Both backends write
/// this exact value.
pub const NO_OBSTACLE_DISTANCE: f32 = f32::MAX;

/// One simulated agent.
///
/// Every `Vec3` is followed by a 4-byte scalar so each row is 16 bytes,
/// which is the alignment WGSL requires for `vec3<f32>` in storage buffers.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec3,
    pub size: f32,
    pub velocity: Vec3,
    /// Cosmetic heat value in `[0, 1]`, derived from speed and crowding.
    pub temperature: f32,
    pub acceleration: Vec3,
    /// Neighbors that contributed to steering in the last Interact pass.
    pub interaction_count: u32,
    pub pending_position: Vec3,
    /// Distance to the nearest obstacle surface (avoidance only).
    pub obstacle_distance: f32,
    pub pending_velocity: Vec3,
    /// Index of the nearest obstacle, or [`NO_OBSTACLE`].
    pub obstacle_id: i32,
    /// Steering written by the Interact pass, consumed by the next Move pass.
    pub pending_acceleration: Vec3,
    /// Magnitude of the avoidance push applied last Interact pass.
    pub repulsion: f32,
    /// Obstacle surface normal at the particle's position.
    pub surface_normal: Vec3,
    /// Distance travelled by the heading ray before it hit or gave up.
    pub ray_length: f32,
    /// Sphere-tracing iterations used by the heading ray.
    pub march_iterations: u32,
    pub _pad: [u32; 3],
}

impl Particle {
    /// Size of one record in bytes (also the instance stride).
    pub const STRIDE: u64 = std::mem::size_of::<Particle>() as u64;

    /// WGSL struct definition matching this layout.
    pub const WGSL_STRUCT: &'static str = r#"
struct Particle {
    position: vec3<f32>,
    size: f32,
    velocity: vec3<f32>,
    temperature: f32,
    acceleration: vec3<f32>,
    interaction_count: u32,
    pending_position: vec3<f32>,
    obstacle_distance: f32,
    pending_velocity: vec3<f32>,
    obstacle_id: i32,
    pending_acceleration: vec3<f32>,
    repulsion: f32,
    surface_normal: vec3<f32>,
    ray_length: f32,
    march_iterations: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};
"#;

    /// Create a particle at rest in its pending state.
    pub fn new(position: Vec3, velocity: Vec3, size: f32) -> Self {
        Self {
            position,
            size,
            velocity,
            temperature: 0.0,
            acceleration: Vec3::ZERO,
            interaction_count: 0,
            pending_position: position,
            obstacle_distance: NO_OBSTACLE_DISTANCE,
            pending_velocity: velocity,
            obstacle_id: NO_OBSTACLE,
            pending_acceleration: Vec3::ZERO,
            repulsion: 0.0,
            surface_normal: Vec3::ZERO,
            ray_length: 0.0,
            march_iterations: 0,
            _pad: [0; 3],
        }
    }

    /// Motion state (committed and pending) holds no NaN or infinity.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.pending_position.is_finite()
            && self.pending_velocity.is_finite()
            && self.pending_acceleration.is_finite()
    }

    /// Per-instance data for the renderer.
    pub fn instance(&self) -> InstanceData {
        InstanceData {
            position: self.position,
            size: self.size,
            velocity: self.velocity,
            temperature: self.temperature,
        }
    }

    /// Vertex layout for drawing the particle buffer as instances.
    ///
    /// Locations: 0 = position, 1 = size, 2 = velocity (heading),
    /// 3 = temperature. The stride skips the simulation-only fields.
    pub fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRIBUTES,
        }
    }
}

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32,
    2 => Float32x3,
    3 => Float32,
];

/// Read-only per-instance view handed to renderers.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub position: Vec3,
    pub size: f32,
    pub velocity: Vec3,
    pub temperature: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_layout_matches_wgsl() {
        assert_eq!(size_of::<Particle>(), 128);
        assert_eq!(offset_of!(Particle, velocity), 16);
        assert_eq!(offset_of!(Particle, acceleration), 32);
        assert_eq!(offset_of!(Particle, pending_position), 48);
        assert_eq!(offset_of!(Particle, pending_velocity), 64);
        assert_eq!(offset_of!(Particle, pending_acceleration), 80);
        assert_eq!(offset_of!(Particle, surface_normal), 96);
        assert_eq!(offset_of!(Particle, march_iterations), 112);
    }

    #[test]
    fn test_instance_attributes_point_at_render_fields() {
        let layout = Particle::instance_layout();
        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(
            offsets,
            vec![
                offset_of!(Particle, position) as u64,
                offset_of!(Particle, size) as u64,
                offset_of!(Particle, velocity) as u64,
                offset_of!(Particle, temperature) as u64,
            ]
        );
        assert_eq!(layout.array_stride, 128);
    }

    #[test]
    fn test_new_particle_has_no_obstacle() {
        let p = Particle::new(Vec3::ONE, Vec3::X, 0.5);
        assert_eq!(p.obstacle_id, NO_OBSTACLE);
        assert_eq!(p.pending_position, Vec3::ONE);
        assert_eq!(p.instance().size, 0.5);
    }
}
