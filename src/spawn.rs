//! Initial particle state.
//!
//! The only time particle data crosses from the host to the GPU is here: the
//! initializer fills both state buffers once at startup.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{AxisRanges, SpawnConfig};
use crate::particle::ParticleState;

/// Supplies the initial population.
pub trait RandomInitializer {
    /// Produce `count` states. Pipeline setup rejects any other length.
    fn initial_states(&mut self, count: u32, ranges: &SpawnConfig) -> Vec<ParticleState>;
}

/// Every component drawn independently and uniformly from its `[min, max)`.
pub struct UniformInitializer {
    rng: StdRng,
}

impl UniformInitializer {
    /// A seeded initializer reproduces the same population every run.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    fn sample(&mut self, [min, max]: [f32; 2]) -> f32 {
        if min >= max {
            min
        } else {
            self.rng.gen_range(min..max)
        }
    }

    fn sample_pair(&mut self, ranges: &AxisRanges) -> [f32; 2] {
        [self.sample(ranges.x), self.sample(ranges.y)]
    }
}

impl RandomInitializer for UniformInitializer {
    fn initial_states(&mut self, count: u32, ranges: &SpawnConfig) -> Vec<ParticleState> {
        (0..count)
            .map(|_| ParticleState {
                position: self.sample_pair(&ranges.position),
                secondary: self.sample_pair(&ranges.secondary),
            })
            .collect()
    }
}

/// A fixed population, used as-is for scripted scenarios.
///
/// The requested count is ignored; a population whose length differs from
/// the configuration fails pipeline setup instead of being padded.
pub struct FixedStates(pub Vec<ParticleState>);

impl RandomInitializer for FixedStates {
    fn initial_states(&mut self, _count: u32, _ranges: &SpawnConfig) -> Vec<ParticleState> {
        self.0.clone()
    }
}
