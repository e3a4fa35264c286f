//! GPU resources for the bin-list flocking passes.
//!
//! [`FlockPipelines`] holds the shader, the shared bind group layout and the
//! three compute pipelines; it lives as long as the device. [`FlockBuffers`]
//! holds the particle store and the tables and is rebuilt whenever the
//! particle count or bin count changes.

use wgpu::util::DeviceExt;

use super::shader::{dispatch_size, flock_shader_source, DIAG_SLOTS};
use crate::config::SimConfig;
use crate::obstacle::{GpuObstacle, MAX_OBSTACLES};
use crate::particle::Particle;
use crate::spatial::EMPTY;
use crate::uniforms::FlockParams;

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Shader module, layout and pipelines for Reset, Move/Insert and Interact.
pub struct FlockPipelines {
    bind_group_layout: wgpu::BindGroupLayout,
    reset_pipeline: wgpu::ComputePipeline,
    move_insert_pipeline: wgpu::ComputePipeline,
    interact_pipeline: wgpu::ComputePipeline,
}

impl FlockPipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flock Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(flock_shader_source().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flock Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                storage_entry(2, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(4, true),
                storage_entry(5, false),
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flock Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            reset_pipeline: pipeline("Reset Bins Pipeline", "reset_bins"),
            move_insert_pipeline: pipeline("Move Insert Pipeline", "move_insert"),
            interact_pipeline: pipeline("Interact Pipeline", "interact"),
            bind_group_layout,
        }
    }
}

/// Particle store, bin-head table, next-pointer table and their uniforms.
pub struct FlockBuffers {
    pub particle_buffer: wgpu::Buffer,
    pub bin_heads: wgpu::Buffer,
    pub next_ptrs: wgpu::Buffer,
    pub diagnostics: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    obstacle_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_particles: u32,
    num_bins: u32,
}

impl FlockBuffers {
    pub fn new(
        device: &wgpu::Device,
        pipelines: &FlockPipelines,
        particles: &[Particle],
        config: &SimConfig,
    ) -> Self {
        let num_particles = particles.len() as u32;
        let num_bins = config.grid.bin_count() as u32;

        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: bytemuck::cast_slice(particles),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });

        let heads = vec![EMPTY; num_bins as usize];
        let bin_heads = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bin Heads"),
            contents: bytemuck::cast_slice(&heads),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });

        let next = vec![EMPTY; particles.len()];
        let next_ptrs = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Next Pointers"),
            contents: bytemuck::cast_slice(&next),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });

        let diagnostics = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Flock Diagnostics"),
            contents: bytemuck::cast_slice(&[0u32; DIAG_SLOTS]),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        });

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Flock Params"),
            contents: bytemuck::cast_slice(&[FlockParams::from_config(config)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let obstacle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Obstacles"),
            contents: bytemuck::cast_slice(&obstacle_table(config)),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Flock Bind Group"),
            layout: &pipelines.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: particle_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: bin_heads.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: next_ptrs.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: params_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: obstacle_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: diagnostics.as_entire_binding() },
            ],
        });

        Self {
            particle_buffer,
            bin_heads,
            next_ptrs,
            diagnostics,
            params_buffer,
            obstacle_buffer,
            bind_group,
            num_particles,
            num_bins,
        }
    }

    pub fn num_particles(&self) -> u32 {
        self.num_particles
    }

    pub fn num_bins(&self) -> u32 {
        self.num_bins
    }

    /// Upload new frame constants and obstacles. Sizes must be unchanged.
    pub fn write_config(&self, queue: &wgpu::Queue, config: &SimConfig) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[FlockParams::from_config(config)]));
        queue.write_buffer(&self.obstacle_buffer, 0, bytemuck::cast_slice(&obstacle_table(config)));
    }

    pub fn encode_reset(&self, encoder: &mut wgpu::CommandEncoder, pipelines: &FlockPipelines) {
        self.encode_pass(encoder, "Reset Bins", &pipelines.reset_pipeline, self.num_bins);
    }

    pub fn encode_move_insert(&self, encoder: &mut wgpu::CommandEncoder, pipelines: &FlockPipelines) {
        self.encode_pass(encoder, "Move Insert", &pipelines.move_insert_pipeline, self.num_particles);
    }

    /// Clears the diagnostic counters, then encodes the Interact pass.
    pub fn encode_interact(&self, encoder: &mut wgpu::CommandEncoder, pipelines: &FlockPipelines) {
        encoder.clear_buffer(&self.diagnostics, 0, None);
        self.encode_pass(encoder, "Interact", &pipelines.interact_pipeline, self.num_particles);
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        items: u32,
    ) {
        let (x, y) = dispatch_size(items);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(x, y, 1);
    }
}

/// Fixed-size obstacle table: live obstacles followed by placeholders.
fn obstacle_table(config: &SimConfig) -> Vec<GpuObstacle> {
    let mut table: Vec<GpuObstacle> = config
        .avoidance
        .obstacles
        .iter()
        .take(MAX_OBSTACLES)
        .map(|o| o.to_gpu())
        .collect();
    table.resize(MAX_OBSTACLES, GpuObstacle::placeholder());
    table
}

/// Bytes the particle store needs on the device.
pub fn particle_bytes(count: usize) -> u64 {
    (count * std::mem::size_of::<Particle>()) as u64
}
