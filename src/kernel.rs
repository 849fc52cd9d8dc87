//! Host-side mirror of the update law.
//!
//! The frame loop never runs this; particle state stays on the GPU. It exists
//! so the WGSL in [`shader_utils`](crate::shader_utils) and the update stage
//! has a plain-Rust counterpart to check against, operation for operation.

use glam::Vec2;

use crate::config::{AgentConfig, WrapMode};
use crate::particle::ParticleState;

/// Keep `position` inside `[0, dimensions)` under `mode`.
pub fn wrap(position: Vec2, dimensions: Vec2, mode: WrapMode) -> Vec2 {
    match mode {
        WrapMode::Toroidal => {
            let m = position - dimensions * (position / dimensions).floor();
            // floor() rounding can land on either side of the range for large
            // or tiny magnitudes
            let w = Vec2::select(m.cmplt(Vec2::ZERO), m + dimensions, m);
            Vec2::select(w.cmplt(Vec2::ZERO) | w.cmpge(dimensions), Vec2::ZERO, w)
        }
        WrapMode::Clamped => position.clamp(Vec2::ZERO, dimensions - Vec2::ONE),
    }
}

/// Simple variant: `position' = wrap(position + velocity * dt)`.
pub fn advance_simple(
    state: ParticleState,
    delta_time: f32,
    dimensions: Vec2,
    mode: WrapMode,
) -> ParticleState {
    let position = Vec2::from(state.position);
    let velocity = Vec2::from(state.secondary);
    ParticleState {
        position: wrap(position + velocity * delta_time, dimensions, mode).to_array(),
        secondary: state.secondary,
    }
}

/// Steering inputs for [`advance_agent`].
#[derive(Debug, Clone, Copy)]
pub struct AgentStep {
    pub index: u32,
    pub frame: u32,
    pub delta_time: f32,
    pub dimensions: Vec2,
    pub mode: WrapMode,
}

/// Extended variant: steer by sensing the trail, then move along the heading.
///
/// `sense` returns the trail intensity at a (wrapped) canvas position.
pub fn advance_agent(
    state: ParticleState,
    step: AgentStep,
    agent: &AgentConfig,
    sense: impl Fn(Vec2) -> f32,
) -> ParticleState {
    let position = Vec2::from(state.position);
    let [mut angle, speed] = state.secondary;

    let sample = |a: f32| {
        let at = position + Vec2::from_angle(a) * agent.sensor_distance;
        sense(wrap(at, step.dimensions, step.mode))
    };
    let forward = sample(angle);
    let left = sample(angle + agent.sensor_angle);
    let right = sample(angle - agent.sensor_angle);

    let turn = agent.turn_speed * step.delta_time;
    let jitter = if agent.randomness {
        hash_unit(hash_u32(step.index ^ hash_u32(step.frame)))
    } else {
        0.5
    };

    if forward > left && forward > right {
        // keep heading
    } else if forward < left && forward < right {
        angle += (jitter - 0.5) * 2.0 * turn;
    } else if right > left {
        angle -= turn;
    } else if left > right {
        angle += turn;
    }

    let next = position + Vec2::from_angle(angle) * speed * step.delta_time;
    ParticleState {
        position: wrap(next, step.dimensions, step.mode).to_array(),
        secondary: [angle, speed],
    }
}

/// Run the simple law over a whole population.
///
/// Input and output are separate slices; the borrow checker rules out the
/// read/write aliasing the GPU buffers avoid by ping-ponging.
pub fn step_simple(
    input: &[ParticleState],
    output: &mut [ParticleState],
    delta_time: f32,
    dimensions: Vec2,
    mode: WrapMode,
) {
    for (src, dst) in input.iter().zip(output.iter_mut()) {
        *dst = advance_simple(*src, delta_time, dimensions, mode);
    }
}

/// 32-bit integer hash used for agent turn jitter.
pub fn hash_u32(mut state: u32) -> u32 {
    state ^= 2_747_636_419;
    state = state.wrapping_mul(2_654_435_769);
    state ^= state >> 16;
    state = state.wrapping_mul(2_654_435_769);
    state ^= state >> 16;
    state = state.wrapping_mul(2_654_435_769);
    state
}

/// Map a hash to `[0, 1]`.
pub fn hash_unit(state: u32) -> f32 {
    state as f32 / 4_294_967_295.0
}
