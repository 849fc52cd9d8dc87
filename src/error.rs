//! Error types for trailsim.
//!
//! Setup and resource errors are fatal before the frame loop starts. Frame
//! errors stop the loop and are handed back to whoever called
//! [`Simulation::run`](crate::Simulation::run); there is no partial recovery,
//! the whole pipeline has to be rebuilt.

use thiserror::Error;

/// Errors raised while bringing up the GPU, the window or the shaders.
#[derive(Debug, Error)]
pub enum SetupError {
    /// No compatible GPU adapter found.
    #[error("No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support.")]
    NoAdapter,
    /// Failed to create a surface for rendering.
    #[error("Failed to create GPU surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    /// Failed to create the GPU device.
    #[error("Failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// A shader module or pipeline failed to compile or link.
    #[error("Shader `{label}` failed to compile: {message}")]
    Shader { label: String, message: String },
    /// The configuration cannot describe a runnable pipeline.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Failed to create the window.
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}

/// The GPU cannot hold the buffers or textures the configuration asks for.
#[derive(Debug, Error)]
pub enum ResourceExhaustion {
    #[error("{particles} particles need a {bytes}-byte state buffer, device limit is {limit} bytes")]
    StateBuffer { particles: u32, bytes: u64, limit: u64 },
    #[error("trail texture {width}x{height} exceeds the device limit of {limit} texels per side")]
    TrailTexture { width: u32, height: u32, limit: u32 },
    #[error("allocation of `{label}` failed: {message}")]
    Allocation { label: String, message: String },
}

/// Errors surfaced while a frame is running.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The surface reported a condition the host cannot recover from.
    #[error("Surface error: {0}")]
    Surface(wgpu::SurfaceError),
    /// The device reported an uncaptured error or was lost.
    #[error("GPU device error: {0}")]
    Device(String),
    /// Mapping a buffer back to the host failed.
    #[error("Failed to map GPU buffer: {0}")]
    BufferMapping(String),
    /// The texture format has no per-texel copy size.
    #[error("Cannot read back a texture in {0:?} format")]
    UnreadableFormat(wgpu::TextureFormat),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors that can occur when running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Resource(#[from] ResourceExhaustion),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Failed to create or run the event loop.
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
