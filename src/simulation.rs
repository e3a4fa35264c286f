//! Simulation driver.
//!
//! [`FlockSimulation`] owns a validated [`SimConfig`] and a
//! [`ComputeBackend`], and sequences the Reset, Move/Insert and Interact
//! passes once per frame.

use crate::backend::{ComputeBackend, FrameSnapshot, PassDiagnostics};
use crate::config::SimConfig;
use crate::cpu::CpuBackend;
use crate::error::{ConfigError, SimulationError, StepError};
use crate::gpu::{GpuBackend, GpuContext};
use crate::particle::{InstanceData, Particle};
use crate::spawn::spawn_particles;
use crate::time::StepClock;

/// A running flock.
///
/// ```
/// use flockgrid::prelude::*;
///
/// let config = SimConfig::new().with_particle_count(200);
/// let mut sim = FlockSimulation::new_cpu(config).unwrap();
/// for _ in 0..10 {
///     sim.step().unwrap();
/// }
/// assert_eq!(sim.frame(), 10);
/// assert!(sim.debug_snapshot().unwrap().report.is_clean());
/// ```
pub struct FlockSimulation<B: ComputeBackend> {
    config: SimConfig,
    backend: B,
    clock: StepClock,
    frame: u64,
    failed_frames: u64,
}

impl FlockSimulation<CpuBackend> {
    /// Run on the rayon CPU backend.
    pub fn new_cpu(config: SimConfig) -> Result<Self, SimulationError> {
        let backend = CpuBackend::new(&config);
        Self::with_backend(config, backend)
    }
}

impl FlockSimulation<GpuBackend> {
    /// Run on the first available GPU adapter.
    pub fn new_gpu(config: SimConfig) -> Result<Self, SimulationError> {
        let backend = GpuBackend::new(GpuContext::new_blocking()?);
        Self::with_backend(config, backend)
    }
}

impl<B: ComputeBackend> FlockSimulation<B> {
    /// Validate `config`, spawn the flock and upload it to `backend`.
    pub fn with_backend(config: SimConfig, mut backend: B) -> Result<Self, SimulationError> {
        config.validate()?;
        warn_uncovered_radii(&config);

        let particles = spawn_particles(&config);
        backend.upload(&particles, &config)?;
        log::info!(
            "{}: {} particles, grid {:?} ({} bins)",
            backend.name(),
            config.particle_count,
            config.grid.resolution.to_array(),
            config.grid.bin_count()
        );

        Ok(Self {
            clock: StepClock::new(config.delta_time),
            config,
            backend,
            frame: 0,
            failed_frames: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut StepClock {
        &mut self.clock
    }

    /// Frames completed successfully.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Frames aborted by an addressing or device error.
    pub fn failed_frames(&self) -> u64 {
        self.failed_frames
    }

    /// Apply a new configuration.
    ///
    /// An invalid configuration is rejected and the current one stays in
    /// effect. Changing the particle count, birth volume, size or speed
    /// bounds, or seed respawns the flock; changing the grid reallocates the
    /// tables but keeps the particles.
    pub fn reconfigure(&mut self, next: SimConfig) -> Result<(), SimulationError> {
        if let Err(e) = next.validate() {
            log::warn!("rejected configuration: {}", e);
            return Err(e.into());
        }
        warn_uncovered_radii(&next);

        if self.config.requires_respawn(&next) {
            let particles = spawn_particles(&next);
            self.backend.upload(&particles, &next)?;
            log::debug!("respawned {} particles", next.particle_count);
        } else if self.config.requires_new_tables(&next) {
            let particles = self.backend.read_particles()?;
            self.backend.upload(&particles, &next)?;
            log::debug!("reallocated tables for {} bins", next.grid.bin_count());
        } else {
            self.backend.configure(&next);
        }

        self.clock.set_fixed_delta(next.delta_time);
        self.config = next;
        Ok(())
    }

    /// Replace the flock with `particles`. The particle count follows the
    /// slice length. Particles with non-finite motion state are rejected.
    pub fn set_particles(&mut self, particles: &[Particle]) -> Result<(), SimulationError> {
        let count = u32::try_from(particles.len()).unwrap_or(u32::MAX);
        let mut next = self.config.clone();
        next.particle_count = count;
        next.validate()?;
        if let Some(index) = particles.iter().position(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteParticle { index }.into());
        }

        self.backend.upload(particles, &next)?;
        self.config = next;
        Ok(())
    }

    pub fn set_update_enabled(&mut self, enabled: bool) {
        self.config.update_enabled = enabled;
    }

    pub fn set_draw_enabled(&mut self, enabled: bool) {
        self.config.draw_enabled = enabled;
    }

    /// Run one frame. Returns `Ok(false)` when updates are disabled.
    pub fn step(&mut self) -> Result<bool, StepError> {
        if !self.config.update_enabled {
            return Ok(false);
        }
        match self.backend.step() {
            Ok(()) => {
                self.frame += 1;
                Ok(true)
            }
            Err(e) => {
                self.failed_frames += 1;
                log::error!("frame {} failed: {}", self.frame, e);
                Err(e)
            }
        }
    }

    /// Feed wall-clock time through the step clock and run the frames that
    /// fall due. Returns the number of frames run.
    pub fn advance(&mut self, real_dt: f32) -> Result<u32, StepError> {
        if !self.config.update_enabled {
            return Ok(0);
        }
        let due = self.clock.advance(real_dt);
        for ran in 0..due {
            if let Err(e) = self.step() {
                self.clock.refund(due - ran);
                return Err(e);
            }
        }
        Ok(due)
    }

    /// Clear every bin head.
    pub fn reset_bins(&mut self) -> Result<(), StepError> {
        self.backend.reset_bins()
    }

    /// Integrate and re-bin every particle. Requires a preceding Reset.
    pub fn move_and_insert(&mut self) -> Result<(), StepError> {
        self.backend.move_and_insert()
    }

    /// Accumulate steering from the 27-bin neighborhood.
    pub fn interact(&mut self) -> Result<(), StepError> {
        self.backend.interact()
    }

    /// Counters from the most recent Interact pass.
    pub fn diagnostics(&self) -> Result<PassDiagnostics, StepError> {
        self.backend.diagnostics()
    }

    /// Synchronous copy of the particle store and both tables, with the
    /// lists already validated. Faults are logged at warn level.
    pub fn debug_snapshot(&self) -> Result<FrameSnapshot, StepError> {
        let snapshot = self.backend.snapshot()?;
        for fault in &snapshot.report.faults {
            log::warn!("bin lists: {}", fault);
        }
        let lost = snapshot.report.lost();
        if !lost.is_empty() {
            log::warn!("bin lists: {} particles unreachable", lost.len());
        }
        Ok(snapshot)
    }

    /// Copy of the particle store.
    pub fn particles(&self) -> Result<Vec<Particle>, StepError> {
        self.backend.read_particles()
    }

    /// Render instances, or nothing when drawing is disabled.
    pub fn instances(&self) -> Result<Vec<InstanceData>, StepError> {
        if !self.config.draw_enabled {
            return Ok(Vec::new());
        }
        Ok(self.backend.read_particles()?.iter().map(Particle::instance).collect())
    }
}

fn warn_uncovered_radii(config: &SimConfig) {
    if !config.radii_covered() {
        log::warn!(
            "interaction radius {} exceeds the smallest bin edge {}; distant neighbors will be missed",
            config.flocking.max_radius(),
            config.grid.min_cell_edge()
        );
    }
}
