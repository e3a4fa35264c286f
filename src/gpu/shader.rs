//! WGSL source for the three flocking passes.
//!
//! The shader is assembled from the struct definitions and helper snippets
//! that live next to their CPU counterparts, so the layouts and the bin
//! mapping are declared once per concern.

use crate::obstacle::OBSTACLE_WGSL;
use crate::particle::Particle;
use crate::spatial::GRID_WGSL;
use crate::uniforms::FlockParams;

pub const WORKGROUP_SIZE: u32 = 256;

/// Slots of the diagnostics counter buffer.
pub const DIAG_INTERACTIONS: usize = 0;
pub const DIAG_TRUNCATED: usize = 1;
pub const DIAG_OUT_OF_RANGE: usize = 2;
/// High word of the interaction total; slot 0 holds the low word.
pub const DIAG_INTERACTIONS_HI: usize = 3;
pub const DIAG_SLOTS: usize = 4;

const BINDINGS_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> particles: array<Particle>;
@group(0) @binding(1) var<storage, read_write> bin_heads: array<atomic<i32>>;
@group(0) @binding(2) var<storage, read_write> next_ptrs: array<i32>;
@group(0) @binding(3) var<uniform> params: FlockParams;
@group(0) @binding(4) var<storage, read> obstacles: array<Obstacle>;
@group(0) @binding(5) var<storage, read_write> diagnostics: array<atomic<u32>>;
"#;

const PASSES_WGSL: &str = r#"
const WORKGROUP_SIZE: u32 = 256u;
const MIN_SEPARATION: f32 = 0.000001;
const MAX_MARCH_STEPS: u32 = 16u;
const HIT_EPSILON: f32 = 0.001;
const CROWD_SATURATION: f32 = 8.0;
const BOUNDARY_CLAMP: u32 = 0u;

const DIAG_INTERACTIONS: u32 = 0u;
const DIAG_TRUNCATED: u32 = 1u;
const DIAG_OUT_OF_RANGE: u32 = 2u;
const DIAG_INTERACTIONS_HI: u32 = 3u;

// Large dispatches are folded into a second grid dimension.
fn linear_index(gid: vec3<u32>, groups: vec3<u32>) -> u32 {
    return gid.x + gid.y * groups.x * WORKGROUP_SIZE;
}

fn bound_speed(v: vec3<f32>) -> vec3<f32> {
    let speed = length(v);
    if speed > params.speed_max {
        return v * (params.speed_max / speed);
    }
    if speed < params.speed_min {
        if speed > 0.0 {
            return v / speed * params.speed_min;
        }
        return vec3<f32>(params.speed_min, 0.0, 0.0);
    }
    return v;
}

struct Motion {
    position: vec3<f32>,
    velocity: vec3<f32>,
};

fn apply_boundary(pos: vec3<f32>, vel: vec3<f32>) -> Motion {
    let below = pos < params.world_min;
    let above = pos > params.world_max;
    var out_vel = vel;
    if params.boundary_policy == BOUNDARY_CLAMP {
        out_vel = select(out_vel, max(out_vel, vec3<f32>(0.0)), below);
        out_vel = select(out_vel, min(out_vel, vec3<f32>(0.0)), above);
    } else {
        out_vel = select(out_vel, abs(out_vel), below);
        out_vel = select(out_vel, -abs(out_vel), above);
    }
    return Motion(clamp(pos, params.world_min, params.world_max), out_vel);
}

@compute @workgroup_size(256)
fn reset_bins(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let bin = linear_index(gid, groups);
    if bin >= params.bin_count {
        return;
    }
    atomicStore(&bin_heads[bin], EMPTY);
}

@compute @workgroup_size(256)
fn move_insert(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = linear_index(gid, groups);
    if idx >= params.particle_count {
        return;
    }
    let p = particles[idx];
    let dt = params.delta_time;

    var accel = p.pending_acceleration;
    let accel_len = length(accel);
    if accel_len > params.max_acceleration {
        accel = accel * (params.max_acceleration / accel_len);
    }
    let vel = bound_speed(p.velocity + accel * dt);
    let motion = apply_boundary(p.position + vel * dt, vel);

    particles[idx].pending_position = motion.position;
    particles[idx].pending_velocity = motion.velocity;
    particles[idx].pending_acceleration = vec3<f32>(0.0);

    let bin = flatten_cell(clamped_cell(motion.position));
    next_ptrs[idx] = atomicExchange(&bin_heads[bin], i32(idx));

    particles[idx].position = motion.position;
    particles[idx].velocity = motion.velocity;
    particles[idx].acceleration = accel;
}

@compute @workgroup_size(256)
fn interact(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = linear_index(gid, groups);
    if idx >= params.particle_count {
        return;
    }
    let pos = particles[idx].position;
    let vel = particles[idx].velocity;
    let cell = clamped_cell(pos);

    var separation = vec3<f32>(0.0);
    var align_sum = vec3<f32>(0.0);
    var align_count = 0u;
    var cohesion_sum = vec3<f32>(0.0);
    var cohesion_count = 0u;
    var interactions = 0u;
    var truncated = 0u;
    var out_of_range = 0u;

    for (var n = 0u; n < 27u; n++) {
        let neighbor = cell + vec3<i32>(i32(n % 3u) - 1, i32((n / 3u) % 3u) - 1, i32(n / 9u) - 1);
        if !cell_in_grid(neighbor) {
            continue;
        }
        var cursor = atomicLoad(&bin_heads[flatten_cell(neighbor)]);
        var steps = 0u;
        loop {
            if cursor == EMPTY {
                break;
            }
            if steps >= params.max_traversal {
                truncated += 1u;
                break;
            }
            if cursor < 0 || u32(cursor) >= params.particle_count {
                out_of_range += 1u;
                break;
            }
            let j = u32(cursor);
            if j != idx {
                let other_pos = particles[j].position;
                let to_other = other_pos - pos;
                let dist = length(to_other);
                var counted = false;
                if dist < params.separation_dist && dist > MIN_SEPARATION {
                    separation -= to_other / (dist * dist);
                    counted = true;
                }
                if dist < params.alignment_dist {
                    align_sum += particles[j].velocity;
                    align_count += 1u;
                    counted = true;
                }
                if dist < params.cohesion_dist {
                    cohesion_sum += other_pos;
                    cohesion_count += 1u;
                    counted = true;
                }
                if counted {
                    interactions += 1u;
                }
            }
            cursor = next_ptrs[j];
            steps += 1u;
        }
    }

    var steer = separation * params.separation_weight;
    if align_count > 0u {
        steer += (align_sum / f32(align_count) - vel) * params.alignment_weight;
    }
    if cohesion_count > 0u {
        steer += (cohesion_sum / f32(cohesion_count) - pos) * params.cohesion_weight;
    }

    var surface_dist = FAR_AWAY;
    var obstacle_id = -1;
    var normal = vec3<f32>(0.0);
    var repulsion = 0.0;
    var iterations = 0u;
    var ray_length = 0.0;
    if params.avoidance_enabled != 0u {
        let nearest = nearest_obstacle(pos);
        if nearest.y >= 0.0 {
            surface_dist = nearest.x;
            obstacle_id = i32(nearest.y);
            normal = obstacle_normal(pos);
            ray_length = params.avoid_distance;

            let speed = length(vel);
            if speed > 0.0 {
                let dir = vel / speed;
                var t = 0.0;
                loop {
                    if iterations >= MAX_MARCH_STEPS {
                        break;
                    }
                    let d = obstacle_field(pos + dir * t);
                    iterations += 1u;
                    if d < HIT_EPSILON {
                        break;
                    }
                    t += d;
                    if t >= params.avoid_distance {
                        break;
                    }
                }
                ray_length = min(t, params.avoid_distance);
            }

            let closest = min(surface_dist, ray_length);
            if closest < params.avoid_distance {
                repulsion = params.avoid_strength * (1.0 - closest / params.avoid_distance);
            }
        }
    }

    let span = params.speed_max - params.speed_min;
    var speed_norm = 0.0;
    if span > 0.0 {
        speed_norm = (length(vel) - params.speed_min) / span;
    }
    let crowd = min(f32(interactions) / CROWD_SATURATION, 1.0);

    particles[idx].pending_acceleration = steer + normal * repulsion;
    particles[idx].interaction_count = interactions;
    particles[idx].temperature = clamp(0.75 * speed_norm + 0.25 * crowd, 0.0, 1.0);
    particles[idx].obstacle_distance = surface_dist;
    particles[idx].obstacle_id = obstacle_id;
    particles[idx].surface_normal = normal;
    particles[idx].repulsion = repulsion;
    particles[idx].march_iterations = iterations;
    particles[idx].ray_length = ray_length;

    if interactions > 0u {
        let before = atomicAdd(&diagnostics[DIAG_INTERACTIONS], interactions);
        if before > 0xffffffffu - interactions {
            atomicAdd(&diagnostics[DIAG_INTERACTIONS_HI], 1u);
        }
    }
    if truncated > 0u {
        atomicAdd(&diagnostics[DIAG_TRUNCATED], truncated);
    }
    if out_of_range > 0u {
        atomicAdd(&diagnostics[DIAG_OUT_OF_RANGE], out_of_range);
    }
}
"#;

/// Full compute module with `reset_bins`, `move_insert` and `interact`
/// entry points.
pub fn flock_shader_source() -> String {
    let mut source = String::new();
    source.push_str(Particle::WGSL_STRUCT);
    source.push_str(FlockParams::WGSL_STRUCT);
    source.push_str(OBSTACLE_WGSL);
    source.push_str(BINDINGS_WGSL);
    source.push_str(GRID_WGSL);
    source.push_str(PASSES_WGSL);
    source
}

/// Workgroup counts covering `items` invocations, folded into y once x hits
/// the per-dimension limit.
pub fn dispatch_size(items: u32) -> (u32, u32) {
    const MAX_GROUPS_PER_DIM: u32 = 65_535;
    let groups = items.div_ceil(WORKGROUP_SIZE).max(1);
    let x = groups.min(MAX_GROUPS_PER_DIM);
    (x, groups.div_ceil(x))
}
