//! Error types for flockgrid.
//!
//! Configuration errors are rejected before they reach a backend, addressing
//! errors abort a single frame, and GPU errors cover device setup and
//! readback.

use std::fmt;

/// A configuration that cannot be simulated.
///
/// Returned by [`SimConfig::validate`](crate::SimConfig::validate). The
/// simulation keeps its previous configuration when one of these is raised.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Particle count is zero or above the supported maximum.
    ParticleCount { count: u32, max: u32 },
    /// One of the grid dimensions is zero.
    ZeroGridDimension { resolution: [u32; 3] },
    /// The grid has more bins than the bin-head table may hold.
    TooManyBins { bins: u64, max: u64 },
    /// World min is not strictly below world max on some axis, or a bound is not finite.
    InvalidBounds { min: [f32; 3], max: [f32; 3] },
    /// The birth volume does not lie inside the world box.
    BirthVolumeOutsideWorld,
    /// `speed_min` is negative or above `speed_max`.
    InvalidSpeedBounds { min: f32, max: f32 },
    /// A weight, radius or strength is negative or not finite.
    NegativeParameter(&'static str),
    /// `delta_time` must be strictly positive.
    InvalidDeltaTime(f32),
    /// Too many obstacles for the obstacle table.
    TooManyObstacles { count: usize, max: usize },
    /// A supplied particle has a NaN or infinite position, velocity or steering.
    NonFiniteParticle { index: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParticleCount { count, max } => {
                write!(f, "Particle count {} is out of range (1..={})", count, max)
            }
            ConfigError::ZeroGridDimension { resolution } => {
                write!(f, "Grid resolution {:?} has a zero dimension", resolution)
            }
            ConfigError::TooManyBins { bins, max } => {
                write!(f, "Grid has {} bins, at most {} are supported", bins, max)
            }
            ConfigError::InvalidBounds { min, max } => {
                write!(f, "World bounds min {:?} / max {:?} do not form a box", min, max)
            }
            ConfigError::BirthVolumeOutsideWorld => {
                write!(f, "Birth volume must lie inside the world bounds")
            }
            ConfigError::InvalidSpeedBounds { min, max } => {
                write!(f, "Speed bounds [{}, {}] are invalid", min, max)
            }
            ConfigError::NegativeParameter(name) => {
                write!(f, "Parameter `{}` must be finite and non-negative", name)
            }
            ConfigError::InvalidDeltaTime(dt) => {
                write!(f, "Delta time {} must be finite and positive", dt)
            }
            ConfigError::TooManyObstacles { count, max } => {
                write!(f, "{} obstacles configured, at most {} are supported", count, max)
            }
            ConfigError::NonFiniteParticle { index } => {
                write!(f, "Particle {} has a non-finite position, velocity or steering", index)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can occur during GPU initialization and readback.
#[derive(Debug)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Failed to map buffer for reading.
    BufferMapping(String),
    /// A buffer would exceed the device's storage binding limit.
    BufferTooLarge { label: &'static str, bytes: u64, max: u64 },
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
            GpuError::BufferTooLarge { label, bytes, max } => write!(
                f,
                "{} needs {} bytes but the device allows {} per storage binding",
                label, bytes, max
            ),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// A simulation step that could not be completed.
///
/// Addressing errors are fatal for the frame: the Interact results of that
/// frame are not committed.
#[derive(Debug)]
pub enum StepError {
    /// A computed bin index fell outside the bin-head table.
    BinOutOfRange { particle: usize, bin: usize, bins: usize },
    /// A next-pointer referenced a particle outside the particle store.
    ParticleOutOfRange { links: u32 },
    /// A pass was dispatched before any particles were uploaded.
    NotUploaded,
    /// GPU dispatch or readback failed.
    Gpu(GpuError),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::BinOutOfRange { particle, bin, bins } => write!(
                f,
                "Particle {} mapped to bin {} but the grid has {} bins",
                particle, bin, bins
            ),
            StepError::ParticleOutOfRange { links } => write!(
                f,
                "{} next-pointer(s) referenced particles outside the store",
                links
            ),
            StepError::NotUploaded => write!(f, "No particle store has been uploaded"),
            StepError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StepError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for StepError {
    fn from(e: GpuError) -> Self {
        StepError::Gpu(e)
    }
}

/// Errors surfaced by [`FlockSimulation`](crate::FlockSimulation) and the runner.
#[derive(Debug)]
pub enum SimulationError {
    /// The configuration was rejected.
    Config(ConfigError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// A frame failed.
    Step(StepError),
    /// Failed to read a configuration file.
    Io(std::io::Error),
    /// Failed to parse a configuration file.
    Parse(serde_json::Error),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Config(e) => write!(f, "Invalid configuration: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
            SimulationError::Step(e) => write!(f, "Simulation step failed: {}", e),
            SimulationError::Io(e) => write!(f, "Failed to read configuration: {}", e),
            SimulationError::Parse(e) => write!(f, "Failed to parse configuration: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Config(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
            SimulationError::Step(e) => Some(e),
            SimulationError::Io(e) => Some(e),
            SimulationError::Parse(e) => Some(e),
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}

impl From<StepError> for SimulationError {
    fn from(e: StepError) -> Self {
        SimulationError::Step(e)
    }
}

impl From<std::io::Error> for SimulationError {
    fn from(e: std::io::Error) -> Self {
        SimulationError::Io(e)
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(e: serde_json::Error) -> Self {
        SimulationError::Parse(e)
    }
}
