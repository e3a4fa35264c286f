//! Simulation constants.
//!
//! A [`SimConfig`] is immutable for the duration of a frame. Changes go
//! through [`FlockSimulation::reconfigure`](crate::FlockSimulation::reconfigure),
//! which validates first and keeps the previous configuration on error.
//!
//! Configurations can be loaded from JSON; missing fields take their
//! default values:
//!
//! ```ignore
//! let config: SimConfig = serde_json::from_str(r#"{ "particle_count": 5000 }"#)?;
//! ```

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::obstacle::{Obstacle, MAX_OBSTACLES};
use crate::spatial::SpatialGrid;

/// Upper bound on the particle store size.
pub const MAX_PARTICLES: u32 = 10_000_000;

/// Upper bound on the number of bins.
pub const MAX_BINS: u64 = 1 << 24;

/// What the Move pass does with a particle that leaves the world box.
///
/// Either way the committed position is inside the box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Clamp the position and zero the outward velocity component.
    #[default]
    Clamp,
    /// Clamp the position and flip the outward velocity component.
    Reflect,
}

impl BoundaryPolicy {
    pub(crate) fn to_gpu(self) -> u32 {
        match self {
            BoundaryPolicy::Clamp => 0,
            BoundaryPolicy::Reflect => 1,
        }
    }
}

/// Separation / alignment / cohesion weights and their radii.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockingParams {
    pub separation_weight: f32,
    pub separation_dist: f32,
    pub alignment_weight: f32,
    pub alignment_dist: f32,
    pub cohesion_weight: f32,
    pub cohesion_dist: f32,
}

impl Default for FlockingParams {
    fn default() -> Self {
        Self {
            separation_weight: 1.5,
            separation_dist: 0.5,
            alignment_weight: 1.0,
            alignment_dist: 1.0,
            cohesion_weight: 0.8,
            cohesion_dist: 1.2,
        }
    }
}

impl FlockingParams {
    /// Largest of the three interaction radii.
    pub fn max_radius(&self) -> f32 {
        self.separation_dist.max(self.alignment_dist).max(self.cohesion_dist)
    }
}

/// Obstacle avoidance settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceParams {
    pub enabled: bool,
    pub strength: f32,
    pub distance: f32,
    pub obstacles: Vec<Obstacle>,
}

impl Default for AvoidanceParams {
    fn default() -> Self {
        Self { enabled: false, strength: 4.0, distance: 2.0, obstacles: Vec::new() }
    }
}

/// Full set of simulation constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub particle_count: u32,
    pub grid: SpatialGrid,
    /// Particles are born uniformly inside `[birth_min, birth_max]`.
    pub birth_min: Vec3,
    pub birth_max: Vec3,
    pub delta_time: f32,
    pub speed_multiplier: f32,
    pub flocking: FlockingParams,
    pub speed_min: f32,
    pub speed_max: f32,
    /// Steering is clamped to this magnitude when the Move pass commits it.
    pub max_acceleration: f32,
    pub size_min: f32,
    pub size_max: f32,
    pub avoidance: AvoidanceParams,
    pub boundary: BoundaryPolicy,
    pub update_enabled: bool,
    pub draw_enabled: bool,
    /// Seed for the birth distribution.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            particle_count: 10_000,
            grid: SpatialGrid::default(),
            birth_min: Vec3::splat(-5.0),
            birth_max: Vec3::splat(5.0),
            delta_time: 1.0 / 60.0,
            speed_multiplier: 1.0,
            flocking: FlockingParams::default(),
            speed_min: 0.5,
            speed_max: 4.0,
            max_acceleration: 10.0,
            size_min: 0.05,
            size_max: 0.1,
            avoidance: AvoidanceParams::default(),
            boundary: BoundaryPolicy::Clamp,
            update_enabled: true,
            draw_enabled: true,
            seed: 0x5eed,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.particle_count = count;
        self
    }

    /// Set the world box. The birth volume is reset to the whole box.
    pub fn with_world_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.grid.world_min = min;
        self.grid.world_max = max;
        self.birth_min = min;
        self.birth_max = max;
        self
    }

    pub fn with_grid_resolution(mut self, resolution: UVec3) -> Self {
        self.grid.resolution = resolution;
        self
    }

    pub fn with_birth_volume(mut self, min: Vec3, max: Vec3) -> Self {
        self.birth_min = min;
        self.birth_max = max;
        self
    }

    pub fn with_delta_time(mut self, dt: f32) -> Self {
        self.delta_time = dt;
        self
    }

    pub fn with_speed_multiplier(mut self, multiplier: f32) -> Self {
        self.speed_multiplier = multiplier;
        self
    }

    pub fn with_flocking(mut self, flocking: FlockingParams) -> Self {
        self.flocking = flocking;
        self
    }

    pub fn with_speed_bounds(mut self, min: f32, max: f32) -> Self {
        self.speed_min = min;
        self.speed_max = max;
        self
    }

    pub fn with_max_acceleration(mut self, max: f32) -> Self {
        self.max_acceleration = max;
        self
    }

    pub fn with_avoidance(mut self, strength: f32, distance: f32, obstacles: Vec<Obstacle>) -> Self {
        self.avoidance = AvoidanceParams { enabled: true, strength, distance, obstacles };
        self
    }

    pub fn with_boundary(mut self, policy: BoundaryPolicy) -> Self {
        self.boundary = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Time advanced by one frame.
    pub fn effective_delta_time(&self) -> f32 {
        self.delta_time * self.speed_multiplier
    }

    /// Check every constant. Does not modify anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_count == 0 || self.particle_count > MAX_PARTICLES {
            return Err(ConfigError::ParticleCount { count: self.particle_count, max: MAX_PARTICLES });
        }

        let res = self.grid.resolution;
        if res.min_element() == 0 {
            return Err(ConfigError::ZeroGridDimension { resolution: res.to_array() });
        }
        let bins = res.x as u64 * res.y as u64 * res.z as u64;
        if bins > MAX_BINS {
            return Err(ConfigError::TooManyBins { bins, max: MAX_BINS });
        }

        let (min, max) = (self.grid.world_min, self.grid.world_max);
        if !min.is_finite() || !max.is_finite() || min.cmpge(max).any() {
            return Err(ConfigError::InvalidBounds { min: min.to_array(), max: max.to_array() });
        }
        if self.birth_min.cmpgt(self.birth_max).any()
            || !self.grid.contains(self.birth_min)
            || !self.grid.contains(self.birth_max)
        {
            return Err(ConfigError::BirthVolumeOutsideWorld);
        }

        if !self.delta_time.is_finite() || self.delta_time <= 0.0 {
            return Err(ConfigError::InvalidDeltaTime(self.delta_time));
        }
        if !(self.speed_min >= 0.0 && self.speed_min <= self.speed_max && self.speed_max.is_finite()) {
            return Err(ConfigError::InvalidSpeedBounds { min: self.speed_min, max: self.speed_max });
        }

        let f = &self.flocking;
        let named = [
            ("speed_multiplier", self.speed_multiplier),
            ("max_acceleration", self.max_acceleration),
            ("size_min", self.size_min),
            ("size_max", self.size_max),
            ("separation_weight", f.separation_weight),
            ("separation_dist", f.separation_dist),
            ("alignment_weight", f.alignment_weight),
            ("alignment_dist", f.alignment_dist),
            ("cohesion_weight", f.cohesion_weight),
            ("cohesion_dist", f.cohesion_dist),
            ("avoidance.strength", self.avoidance.strength),
            ("avoidance.distance", self.avoidance.distance),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeParameter(name));
            }
        }
        if self.size_min > self.size_max {
            return Err(ConfigError::NegativeParameter("size_max"));
        }

        if self.avoidance.obstacles.len() > MAX_OBSTACLES {
            return Err(ConfigError::TooManyObstacles {
                count: self.avoidance.obstacles.len(),
                max: MAX_OBSTACLES,
            });
        }

        Ok(())
    }

    /// Whether the 27-bin neighborhood covers every interaction radius.
    pub fn radii_covered(&self) -> bool {
        self.flocking.max_radius() <= self.grid.min_cell_edge()
    }

    /// True when moving from `self` to `next` needs a fresh particle store.
    pub(crate) fn requires_respawn(&self, next: &SimConfig) -> bool {
        self.particle_count != next.particle_count
            || self.birth_min != next.birth_min
            || self.birth_max != next.birth_max
            || self.size_min != next.size_min
            || self.size_max != next.size_max
            || self.speed_min != next.speed_min
            || self.speed_max != next.speed_max
            || self.seed != next.seed
    }

    /// True when the bin-head table must be reallocated.
    pub(crate) fn requires_new_tables(&self, next: &SimConfig) -> bool {
        self.grid != next.grid || self.particle_count != next.particle_count
    }
}
