//! wgpu compute backend.
//!
//! The particle store lives in a single storage buffer that doubles as the
//! instance vertex buffer for rendering. Move/Insert commits each particle's
//! pending state in place, so Interact of the same frame reads post-Move
//! neighbors without a second particle buffer.
//!
//! Out-of-range links are counted in [`PassDiagnostics`] but cannot stop the
//! frame from committing, since the counters are only visible after the
//! dispatch completes.

mod readback;
pub mod shader;
mod spatial_gpu;

pub use spatial_gpu::{FlockBuffers, FlockPipelines};

use crate::backend::{ComputeBackend, FrameSnapshot, PassDiagnostics};
use crate::config::SimConfig;
use crate::error::{GpuError, StepError};
use crate::particle::Particle;
use crate::validate::validate_lists;
use readback::read_buffer;
use shader::{DIAG_INTERACTIONS, DIAG_INTERACTIONS_HI, DIAG_OUT_OF_RANGE, DIAG_SLOTS, DIAG_TRUNCATED};

/// Device and queue without a presentation surface.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
}

impl GpuContext {
    pub async fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_name = adapter.get_info().name;

        // Large particle stores need the adapter's full storage binding size.
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Flock Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        log::info!("gpu: using adapter {}", adapter_name);
        Ok(Self { device, queue, adapter_name })
    }

    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }
}

pub struct GpuBackend {
    context: GpuContext,
    pipelines: FlockPipelines,
    buffers: Option<FlockBuffers>,
}

impl GpuBackend {
    pub fn new(context: GpuContext) -> Self {
        let pipelines = FlockPipelines::new(&context.device);
        Self { context, pipelines, buffers: None }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// The particle store, bindable as an instance vertex buffer with
    /// [`Particle::instance_layout`].
    pub fn particle_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffers.as_ref().map(|b| &b.particle_buffer)
    }

    fn buffers(&self) -> Result<&FlockBuffers, StepError> {
        self.buffers.as_ref().ok_or(StepError::NotUploaded)
    }

    fn check_binding_size(&self, label: &'static str, bytes: u64) -> Result<(), GpuError> {
        let max = self.context.device.limits().max_storage_buffer_binding_size as u64;
        if bytes > max {
            return Err(GpuError::BufferTooLarge { label, bytes, max });
        }
        Ok(())
    }

    fn submit_pass(
        &self,
        label: &str,
        encode: impl FnOnce(&FlockBuffers, &mut wgpu::CommandEncoder, &FlockPipelines),
    ) -> Result<(), StepError> {
        let buffers = self.buffers()?;
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        encode(buffers, &mut encoder, &self.pipelines);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn upload(&mut self, particles: &[Particle], config: &SimConfig) -> Result<(), StepError> {
        self.check_binding_size("particle store", spatial_gpu::particle_bytes(particles.len()))?;
        self.check_binding_size("bin-head table", (config.grid.bin_count() * 4) as u64)?;

        self.buffers = Some(FlockBuffers::new(&self.context.device, &self.pipelines, particles, config));
        log::debug!(
            "gpu: allocated {} particles, {} bins",
            particles.len(),
            config.grid.bin_count()
        );
        Ok(())
    }

    fn configure(&mut self, config: &SimConfig) {
        if let Some(buffers) = &self.buffers {
            debug_assert_eq!(buffers.num_bins() as usize, config.grid.bin_count());
            buffers.write_config(&self.context.queue, config);
        }
    }

    fn reset_bins(&mut self) -> Result<(), StepError> {
        self.submit_pass("Reset Bins Encoder", |b, e, p| b.encode_reset(e, p))
    }

    fn move_and_insert(&mut self) -> Result<(), StepError> {
        self.submit_pass("Move Insert Encoder", |b, e, p| b.encode_move_insert(e, p))
    }

    fn interact(&mut self) -> Result<(), StepError> {
        self.submit_pass("Interact Encoder", |b, e, p| b.encode_interact(e, p))
    }

    /// All three passes in one submission.
    fn step(&mut self) -> Result<(), StepError> {
        self.submit_pass("Flock Step Encoder", |b, e, p| {
            b.encode_reset(e, p);
            b.encode_move_insert(e, p);
            b.encode_interact(e, p);
        })
    }

    fn diagnostics(&self) -> Result<PassDiagnostics, StepError> {
        let buffers = self.buffers()?;
        let counters: Vec<u32> =
            read_buffer(&self.context.device, &self.context.queue, &buffers.diagnostics, DIAG_SLOTS)?;
        Ok(PassDiagnostics {
            interactions: wide_counter(counters[DIAG_INTERACTIONS], counters[DIAG_INTERACTIONS_HI]),
            truncated_traversals: counters[DIAG_TRUNCATED],
            out_of_range_links: counters[DIAG_OUT_OF_RANGE],
        })
    }

    fn snapshot(&self) -> Result<FrameSnapshot, StepError> {
        let buffers = self.buffers()?;
        let device = &self.context.device;
        let queue = &self.context.queue;
        let count = buffers.num_particles() as usize;

        let particles: Vec<Particle> = read_buffer(device, queue, &buffers.particle_buffer, count)?;
        let bin_heads: Vec<i32> = read_buffer(device, queue, &buffers.bin_heads, buffers.num_bins() as usize)?;
        let next: Vec<i32> = read_buffer(device, queue, &buffers.next_ptrs, count)?;
        let report = validate_lists(&bin_heads, &next);

        Ok(FrameSnapshot { particles, bin_heads, next, report })
    }

    fn read_particles(&self) -> Result<Vec<Particle>, StepError> {
        let buffers = self.buffers()?;
        Ok(read_buffer(
            &self.context.device,
            &self.context.queue,
            &buffers.particle_buffer,
            buffers.num_particles() as usize,
        )?)
    }
}

/// Join the low and carry words of a 64-bit device counter.
fn wide_counter(lo: u32, hi: u32) -> u64 {
    (u64::from(hi) << 32) | u64::from(lo)
}
