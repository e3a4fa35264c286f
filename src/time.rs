//! Fixed-step clock for driving the simulation from wall-clock time.
//!
//! Real frame times are accumulated and converted into a whole number of
//! fixed simulation steps, so the flock behaves the same regardless of the
//! caller's frame rate.
//!
//! # Example
//!
//! ```
//! use flockgrid::time::StepClock;
//!
//! let mut clock = StepClock::new(0.25);
//! assert_eq!(clock.advance(0.6), 2);
//! assert_eq!(clock.frame(), 2);
//! assert!((clock.alpha() - 0.4).abs() < 1e-4);
//! ```

/// Accumulator that turns real time into fixed steps.
#[derive(Debug, Clone)]
pub struct StepClock {
    /// Simulated seconds per step.
    fixed_delta: f32,
    /// Real time not yet consumed by a step.
    accumulator: f32,
    /// Time scale multiplier (1.0 = normal speed).
    time_scale: f32,
    /// Upper bound on steps returned by one `advance` call.
    max_steps: u32,
    /// Whether time is paused.
    paused: bool,
    /// Total steps taken.
    frame_count: u64,
    /// Simulated seconds covered by all steps.
    elapsed: f64,
}

impl StepClock {
    /// Default bound on catch-up steps per call.
    pub const DEFAULT_MAX_STEPS: u32 = 8;

    pub fn new(fixed_delta: f32) -> Self {
        Self {
            fixed_delta: fixed_delta.max(f32::EPSILON),
            accumulator: 0.0,
            time_scale: 1.0,
            max_steps: Self::DEFAULT_MAX_STEPS,
            paused: false,
            frame_count: 0,
            elapsed: 0.0,
        }
    }

    /// Feed `real_dt` seconds of wall-clock time and return how many fixed
    /// steps are due.
    ///
    /// When more than `max_steps` are due, the excess is dropped instead of
    /// being carried into later calls.
    pub fn advance(&mut self, real_dt: f32) -> u32 {
        if self.paused || !real_dt.is_finite() || real_dt <= 0.0 {
            return 0;
        }
        self.accumulator += real_dt * self.time_scale;

        let due = (self.accumulator / self.fixed_delta).floor() as u32;
        let steps = due.min(self.max_steps);
        self.accumulator -= steps as f32 * self.fixed_delta;
        if due > steps {
            log::debug!("clock: dropped {} steps", due - steps);
            self.accumulator = self.accumulator.min(self.fixed_delta);
        }

        self.frame_count += steps as u64;
        self.elapsed += steps as f64 * self.fixed_delta as f64;
        steps
    }

    /// Give back `steps` that an earlier `advance` returned but that never
    /// ran. Their time goes back into the accumulator and they stop counting
    /// toward `frame` and `elapsed`.
    pub fn refund(&mut self, steps: u32) {
        let steps = u64::from(steps).min(self.frame_count);
        self.frame_count -= steps;
        self.elapsed = (self.elapsed - steps as f64 * self.fixed_delta as f64).max(0.0);
        self.accumulator += steps as f32 * self.fixed_delta;
    }

    /// Fraction of a step left in the accumulator, for render interpolation.
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.fixed_delta).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn fixed_delta(&self) -> f32 {
        self.fixed_delta
    }

    /// Change the step length. Pending time is kept.
    pub fn set_fixed_delta(&mut self, fixed_delta: f32) {
        self.fixed_delta = fixed_delta.max(f32::EPSILON);
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Simulated seconds covered by all steps so far.
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Negative scales are treated as zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_max_steps(&mut self, max_steps: u32) {
        self.max_steps = max_steps.max(1);
    }

    /// Drop pending time and zero the counters.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.frame_count = 0;
        self.elapsed = 0.0;
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}
