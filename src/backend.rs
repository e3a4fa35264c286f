//! The compute backend seam.
//!
//! A backend exclusively owns the particle store, the bin-head table and the
//! next-pointer table, and exposes the three simulation passes as opaque
//! steps. Callers never touch the tables directly; the only way to look at
//! them is a [`FrameSnapshot`].

use crate::config::SimConfig;
use crate::error::StepError;
use crate::particle::Particle;
use crate::validate::ValidationReport;

/// Counters gathered by the last Interact pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassDiagnostics {
    /// Sum of `interaction_count` over all particles.
    pub interactions: u64,
    /// List walks stopped by the step bound (a cycle is the usual cause).
    pub truncated_traversals: u32,
    /// Next-pointers that pointed outside the particle store.
    pub out_of_range_links: u32,
}

impl PassDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.truncated_traversals == 0 && self.out_of_range_links == 0
    }
}

/// Synchronous copy of all backend-owned tables.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    pub particles: Vec<Particle>,
    pub bin_heads: Vec<i32>,
    pub next: Vec<i32>,
    pub report: ValidationReport,
}

/// Executes the Reset, Move/Insert and Interact passes.
///
/// The passes of one frame must run in that order; each call returns only
/// after the pass's writes are visible to the next one.
pub trait ComputeBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Replace the particle store wholesale and size the tables for `config`.
    fn upload(&mut self, particles: &[Particle], config: &SimConfig) -> Result<(), StepError>;

    /// Update the frame constants. Store and table sizes must not change.
    fn configure(&mut self, config: &SimConfig);

    /// Clear every bin head to the empty sentinel.
    fn reset_bins(&mut self) -> Result<(), StepError>;

    /// Integrate every particle and link it into its bin.
    fn move_and_insert(&mut self) -> Result<(), StepError>;

    /// Walk the 27-bin neighborhood of every particle and write steering.
    fn interact(&mut self) -> Result<(), StepError>;

    /// Counters from the most recent Interact pass.
    fn diagnostics(&self) -> Result<PassDiagnostics, StepError>;

    /// Copy the store and tables, and validate the lists.
    fn snapshot(&self) -> Result<FrameSnapshot, StepError>;

    /// Copy of the particle store alone.
    fn read_particles(&self) -> Result<Vec<Particle>, StepError>;

    /// One full frame.
    fn step(&mut self) -> Result<(), StepError> {
        self.reset_bins()?;
        self.move_and_insert()?;
        self.interact()
    }
}
