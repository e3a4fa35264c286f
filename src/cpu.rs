//! Data-parallel CPU backend.
//!
//! Each pass is a rayon parallel iterator with one task per particle (or per
//! bin for Reset). Completion of the iterator is the pass barrier. The only
//! shared write is the bin-head exchange, which is a single
//! `AtomicI32::swap`; everything else is written by the owning particle's
//! task only.
//!
//! The Interact pass reads the front particle buffer and writes the back
//! buffer; the buffers are swapped once the pass completed without an
//! addressing error.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use glam::Vec3;
use rayon::prelude::*;

use crate::backend::{ComputeBackend, FrameSnapshot, PassDiagnostics};
use crate::config::SimConfig;
use crate::error::StepError;
use crate::motion;
use crate::particle::{Particle, NO_OBSTACLE};
use crate::spatial::EMPTY;
use crate::steering::{self, FlockAccumulator};
use crate::validate::{as_particle, validate_lists};

pub struct CpuBackend {
    config: SimConfig,
    particles: Vec<Particle>,
    back: Vec<Particle>,
    heads: Vec<AtomicI32>,
    next: Vec<i32>,
    diagnostics: PassDiagnostics,
}

impl CpuBackend {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            config: config.clone(),
            particles: Vec::new(),
            back: Vec::new(),
            heads: Vec::new(),
            next: Vec::new(),
            diagnostics: PassDiagnostics::default(),
        }
    }

    /// Current particle store.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn upload(&mut self, particles: &[Particle], config: &SimConfig) -> Result<(), StepError> {
        self.config = config.clone();
        self.particles = particles.to_vec();
        self.back = particles.to_vec();
        self.heads = (0..config.grid.bin_count()).map(|_| AtomicI32::new(EMPTY)).collect();
        self.next = vec![EMPTY; particles.len()];
        self.diagnostics = PassDiagnostics::default();
        log::debug!(
            "cpu: allocated {} particles, {} bins",
            self.particles.len(),
            self.heads.len()
        );
        Ok(())
    }

    fn configure(&mut self, config: &SimConfig) {
        debug_assert_eq!(config.grid.bin_count(), self.heads.len());
        self.config = config.clone();
    }

    fn reset_bins(&mut self) -> Result<(), StepError> {
        self.heads.par_iter().for_each(|head| head.store(EMPTY, Ordering::Relaxed));
        Ok(())
    }

    fn move_and_insert(&mut self) -> Result<(), StepError> {
        let config = &self.config;
        let heads = &self.heads;
        let bins = heads.len();

        self.particles
            .par_iter_mut()
            .zip(self.next.par_iter_mut())
            .enumerate()
            .try_for_each(|(i, (p, next_slot))| {
                let step = motion::integrate(p, config);
                p.pending_position = step.position;
                p.pending_velocity = step.velocity;
                p.pending_acceleration = Vec3::ZERO;

                let bin = config.grid.clamped_bin_index(step.position);
                debug_assert!(bin < bins, "particle {} mapped to bin {} of {}", i, bin, bins);
                if bin >= bins {
                    return Err(StepError::BinOutOfRange { particle: i, bin, bins });
                }
                // Exchange-and-link: one indivisible read-modify-write.
                *next_slot = heads[bin].swap(i as i32, Ordering::AcqRel);

                p.position = p.pending_position;
                p.velocity = p.pending_velocity;
                p.acceleration = step.acceleration;
                Ok(())
            })
    }

    fn interact(&mut self) -> Result<(), StepError> {
        let config = &self.config;
        let grid = config.grid;
        let front = &self.particles;
        let heads = &self.heads;
        let next = &self.next;
        let count = front.len();

        let truncated = AtomicU32::new(0);
        let out_of_range = AtomicU32::new(0);

        let interactions: u64 = self
            .back
            .par_iter_mut()
            .enumerate()
            .map(|(i, out)| {
                let me = &front[i];
                let mut acc = FlockAccumulator::default();

                for bin in grid.neighbor_bins(grid.clamped_coords(me.position)) {
                    let mut cursor = heads[bin].load(Ordering::Acquire);
                    let mut steps = 0;
                    while cursor != EMPTY {
                        if steps >= count {
                            truncated.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                        let Some(j) = as_particle(cursor, count) else {
                            out_of_range.fetch_add(1, Ordering::Relaxed);
                            break;
                        };
                        if j != i {
                            let other = &front[j];
                            acc.add_neighbor(&config.flocking, me.position, other.position, other.velocity);
                        }
                        cursor = next[j];
                        steps += 1;
                    }
                }

                let avoidance = steering::avoid(
                    &config.avoidance,
                    &config.avoidance.obstacles,
                    me.position,
                    me.velocity,
                );

                *out = *me;
                out.pending_acceleration =
                    acc.steering(&config.flocking, me.position, me.velocity) + avoidance.acceleration();
                out.interaction_count = acc.interactions;
                out.temperature = steering::temperature(
                    me.velocity.length(),
                    config.speed_min,
                    config.speed_max,
                    acc.interactions,
                );
                out.obstacle_distance = avoidance.distance;
                out.obstacle_id = avoidance.obstacle_id.map_or(NO_OBSTACLE, |id| id as i32);
                out.surface_normal = avoidance.normal;
                out.repulsion = avoidance.repulsion;
                out.march_iterations = avoidance.iterations;
                out.ray_length = avoidance.ray_length;

                acc.interactions as u64
            })
            .sum();

        self.diagnostics = PassDiagnostics {
            interactions,
            truncated_traversals: truncated.into_inner(),
            out_of_range_links: out_of_range.into_inner(),
        };

        if self.diagnostics.out_of_range_links > 0 {
            log::error!(
                "cpu: {} out-of-range next-pointers, interact results discarded",
                self.diagnostics.out_of_range_links
            );
            return Err(StepError::ParticleOutOfRange { links: self.diagnostics.out_of_range_links });
        }
        if self.diagnostics.truncated_traversals > 0 {
            log::warn!(
                "cpu: {} bin walks hit the {}-step bound",
                self.diagnostics.truncated_traversals,
                count
            );
        }

        std::mem::swap(&mut self.particles, &mut self.back);
        Ok(())
    }

    fn diagnostics(&self) -> Result<PassDiagnostics, StepError> {
        Ok(self.diagnostics)
    }

    fn snapshot(&self) -> Result<FrameSnapshot, StepError> {
        let bin_heads: Vec<i32> = self.heads.iter().map(|h| h.load(Ordering::Acquire)).collect();
        let report = validate_lists(&bin_heads, &self.next);
        Ok(FrameSnapshot {
            particles: self.particles.clone(),
            bin_heads,
            next: self.next.clone(),
            report,
        })
    }

    fn read_particles(&self) -> Result<Vec<Particle>, StepError> {
        Ok(self.particles.clone())
    }
}
