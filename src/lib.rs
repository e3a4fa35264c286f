//! # flockgrid
//!
//! Data-parallel boids on a uniform 3D grid.
//!
//! Every frame runs three passes over a fixed particle store:
//!
//! 1. **Reset** clears the bin-head table.
//! 2. **Move/Insert** integrates each particle from the steering left by the
//!    previous frame, then links it into its bin with one atomic exchange on
//!    the bin head.
//! 3. **Interact** walks the 27 bins around each particle and writes
//!    separation, alignment, cohesion and obstacle avoidance into its pending
//!    acceleration for the next frame.
//!
//! The passes run on either a rayon CPU backend or a wgpu compute backend,
//! both behind [`ComputeBackend`].
//!
//! ## Quick Start
//!
//! ```
//! use flockgrid::prelude::*;
//!
//! let config = SimConfig::new()
//!     .with_particle_count(500)
//!     .with_world_bounds(Vec3::splat(-8.0), Vec3::splat(8.0))
//!     .with_grid_resolution(UVec3::splat(8))
//!     .with_avoidance(4.0, 2.0, vec![Obstacle::Sphere { center: Vec3::ZERO, radius: 1.5 }]);
//!
//! let mut sim = FlockSimulation::new_cpu(config).unwrap();
//! sim.step().unwrap();
//! let instances = sim.instances().unwrap();
//! assert_eq!(instances.len(), 500);
//! ```
//!
//! ## Binning
//!
//! A position maps to `floor((p - world_min) / (world_max - world_min) * resolution)`
//! per axis and flattens to `x + y * gx + z * gx * gy`. The Insert pass clamps
//! coordinates into the grid, so every particle lands in exactly one bin.
//! Interaction radii should not exceed the smallest bin edge; larger radii
//! are accepted with a warning and neighbors beyond one bin are missed.
//!
//! ## Frame Contract
//!
//! Steering computed in frame *n* is applied by Move in frame *n + 1*.
//! Interact of frame *n* reads the positions and velocities committed by
//! Move of the same frame.

pub mod backend;
pub mod config;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod motion;
pub mod obstacle;
pub mod particle;
mod simulation;
pub mod spatial;
pub mod spawn;
pub mod steering;
pub mod time;
pub mod uniforms;
pub mod validate;

pub use backend::{ComputeBackend, FrameSnapshot, PassDiagnostics};
pub use bytemuck;
pub use config::{AvoidanceParams, BoundaryPolicy, FlockingParams, SimConfig, MAX_BINS, MAX_PARTICLES};
pub use cpu::CpuBackend;
pub use error::{ConfigError, GpuError, SimulationError, StepError};
pub use glam::{IVec3, UVec3, Vec3};
pub use gpu::{GpuBackend, GpuContext};
pub use obstacle::{Obstacle, MAX_OBSTACLES};
pub use particle::{InstanceData, Particle, NO_OBSTACLE, NO_OBSTACLE_DISTANCE};
pub use simulation::FlockSimulation;
pub use spatial::{SpatialGrid, EMPTY};
pub use spawn::SpawnContext;
pub use time::StepClock;
pub use validate::{ListFault, ValidationReport};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoundaryPolicy, ComputeBackend, CpuBackend, FlockSimulation, FlockingParams, GpuBackend,
        GpuContext, InstanceData, Obstacle, Particle, SimConfig, SpatialGrid, StepClock,
    };
    pub use glam::{UVec3, Vec3};
}
