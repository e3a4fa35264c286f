//! Signed-distance-field obstacles for avoidance steering.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::particle::NO_OBSTACLE_DISTANCE;

/// Maximum obstacles uploaded to the GPU obstacle table.
pub const MAX_OBSTACLES: usize = 64;

/// Step used for central-difference normals.
const NORMAL_EPSILON: f32 = 1.0e-3;

/// A solid the flock steers around.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Obstacle {
    Sphere { center: Vec3, radius: f32 },
    Box { center: Vec3, half_extents: Vec3 },
}

impl Obstacle {
    /// Signed distance from `p` to the surface (negative inside).
    pub fn distance(&self, p: Vec3) -> f32 {
        match *self {
            Obstacle::Sphere { center, radius } => (p - center).length() - radius,
            Obstacle::Box { center, half_extents } => {
                let q = (p - center).abs() - half_extents;
                q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
            }
        }
    }

    pub fn to_gpu(&self) -> GpuObstacle {
        match *self {
            Obstacle::Sphere { center, radius } => GpuObstacle {
                center,
                kind: GpuObstacle::SPHERE,
                extents: Vec3::ZERO,
                radius,
            },
            Obstacle::Box { center, half_extents } => GpuObstacle {
                center,
                kind: GpuObstacle::BOX,
                extents: half_extents,
                radius: 0.0,
            },
        }
    }
}

/// GPU representation of an [`Obstacle`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GpuObstacle {
    pub center: Vec3,
    pub kind: u32,
    pub extents: Vec3,
    pub radius: f32,
}

impl GpuObstacle {
    pub const SPHERE: u32 = 0;
    pub const BOX: u32 = 1;
    /// Placeholder so the obstacle buffer is never empty.
    pub const NONE: u32 = 2;

    pub fn placeholder() -> Self {
        Self { center: Vec3::ZERO, kind: Self::NONE, extents: Vec3::ZERO, radius: 0.0 }
    }
}

/// Nearest surface over a set of obstacles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceQuery {
    pub distance: f32,
    pub id: Option<usize>,
}

/// Union of all obstacles (minimum distance).
pub fn nearest(obstacles: &[Obstacle], p: Vec3) -> SurfaceQuery {
    obstacles.iter().enumerate().fold(
        SurfaceQuery { distance: NO_OBSTACLE_DISTANCE, id: None },
        |best, (i, o)| {
            let d = o.distance(p);
            if d < best.distance {
                SurfaceQuery { distance: d, id: Some(i) }
            } else {
                best
            }
        },
    )
}

/// Outward normal of the union field at `p` by central differences.
pub fn surface_normal(obstacles: &[Obstacle], p: Vec3) -> Vec3 {
    let field = |q: Vec3| nearest(obstacles, q).distance;
    let dx = Vec3::new(NORMAL_EPSILON, 0.0, 0.0);
    let dy = Vec3::new(0.0, NORMAL_EPSILON, 0.0);
    let dz = Vec3::new(0.0, 0.0, NORMAL_EPSILON);
    Vec3::new(
        field(p + dx) - field(p - dx),
        field(p + dy) - field(p - dy),
        field(p + dz) - field(p - dz),
    )
    .normalize_or_zero()
}

/// WGSL for the obstacle field. Expects `obstacles` storage array and
/// `params.obstacle_count`.
pub const OBSTACLE_WGSL: &str = r#"
struct Obstacle {
    center: vec3<f32>,
    kind: u32,
    extents: vec3<f32>,
    radius: f32,
};

const OBSTACLE_SPHERE: u32 = 0u;
const OBSTACLE_BOX: u32 = 1u;
const NORMAL_EPSILON: f32 = 0.001;
const FAR_AWAY: f32 = 3.4028235e38;

fn obstacle_distance(o: Obstacle, p: vec3<f32>) -> f32 {
    if o.kind == OBSTACLE_SPHERE {
        return length(p - o.center) - o.radius;
    }
    if o.kind == OBSTACLE_BOX {
        let q = abs(p - o.center) - o.extents;
        return length(max(q, vec3<f32>(0.0))) + min(max(q.x, max(q.y, q.z)), 0.0);
    }
    return FAR_AWAY;
}

// x = distance, y = obstacle id as f32 (-1 when none)
fn nearest_obstacle(p: vec3<f32>) -> vec2<f32> {
    var best = vec2<f32>(FAR_AWAY, -1.0);
    for (var i = 0u; i < params.obstacle_count; i++) {
        let d = obstacle_distance(obstacles[i], p);
        if d < best.x {
            best = vec2<f32>(d, f32(i));
        }
    }
    return best;
}

fn obstacle_field(p: vec3<f32>) -> f32 {
    return nearest_obstacle(p).x;
}

fn obstacle_normal(p: vec3<f32>) -> vec3<f32> {
    let dx = vec3<f32>(NORMAL_EPSILON, 0.0, 0.0);
    let dy = vec3<f32>(0.0, NORMAL_EPSILON, 0.0);
    let dz = vec3<f32>(0.0, 0.0, NORMAL_EPSILON);
    let g = vec3<f32>(
        obstacle_field(p + dx) - obstacle_field(p - dx),
        obstacle_field(p + dy) - obstacle_field(p - dy),
        obstacle_field(p + dz) - obstacle_field(p - dz),
    );
    let len = length(g);
    if len > 0.0 {
        return g / len;
    }
    return vec3<f32>(0.0);
}
"#;
