//! # trailsim
//!
//! A large particle population advanced entirely on the GPU, drawn into a
//! persistent trail texture that is displayed and fed back into the next
//! frame.
//!
//! Particle data crosses from the host to the GPU once, at startup. After
//! that every frame is four passes recorded into one submission:
//!
//! 1. **Update** reads the read-role state buffer and writes the write-role
//!    buffer (a compute pass, nothing rasterized). State roles swap.
//! 2. **Draw** rasterizes every particle as a point into the write-role trail
//!    texture, loading or clearing it first. Trail roles swap.
//! 3. **Post** (extended variant) diffuses and decays the trail.
//! 4. **Composite** samples the read-role trail onto the window.
//!
//! ## Quick Start
//!
//! ```ignore
//! use trailsim::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     let config = SimConfig {
//!         particle_count: 500_000,
//!         variant: Variant::Extended,
//!         ..Default::default()
//!     };
//!     Simulation::new(config).run()
//! }
//! ```
//!
//! ## Variants
//!
//! | Variant | `secondary` | Update law | Post |
//! |---------|-------------|------------|------|
//! | [`Variant::Simple`] | velocity (px/s) | `wrap(position + velocity * dt)` | no |
//! | [`Variant::Extended`] | `(angle, speed)` | steer by sampled trail, then move along the heading | diffuse + decay |
//!
//! Positions are in pixels, `[0, width) x [0, height)`. The boundary policy
//! is [`WrapMode::Toroidal`] or [`WrapMode::Clamped`].

pub mod config;
pub mod driver;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod particle;
pub mod roles;
pub mod shader_utils;
pub mod simulation;
pub mod spawn;
pub mod time;
pub mod uniforms;

pub use config::{
    AgentConfig, AxisRanges, PostConfig, SimConfig, SpawnConfig, TrailBlend, TrailPolicy,
    Variant, WrapMode,
};
pub use driver::{FrameDriver, FramePhase, FrameReport};
pub use error::{ConfigError, FrameError, ResourceExhaustion, SetupError, SimulationError};
pub use glam::Vec2;
pub use particle::ParticleState;
pub use roles::{PingPong, Slot};
pub use simulation::{HeadlessSimulation, Simulation};
pub use spawn::{FixedStates, RandomInitializer, UniformInitializer};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use trailsim::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{SimConfig, TrailBlend, TrailPolicy, Variant, WrapMode};
    pub use crate::error::SimulationError;
    pub use crate::particle::ParticleState;
    pub use crate::simulation::{HeadlessSimulation, Simulation};
    pub use crate::spawn::RandomInitializer;
    pub use crate::Vec2;
}
