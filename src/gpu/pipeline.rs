//! Every GPU resource built from the configuration, and the per-stage
//! encode calls the frame driver sequences.
//!
//! The pipeline holds the two role selectors (state buffers and trail
//! textures). Stages only ever see the buffers and textures the current
//! roles hand them.

use super::composite::CompositeStage;
use super::draw::DrawStage;
use super::post_process::PostStage;
use super::state_buffers::StateBuffers;
use super::trail_target::TrailTarget;
use super::update::{StreamTransform, UpdateStage};
use super::GpuContext;
use crate::config::SimConfig;
use crate::error::{SetupError, SimulationError};
use crate::particle::ParticleState;
use crate::uniforms::{FrameUniforms, UniformBlock};

pub struct Pipeline {
    frame_uniforms: FrameUniforms,
    uniforms: UniformBlock,
    states: StateBuffers,
    trail: TrailTarget,
    update: UpdateStage,
    draw: DrawStage,
    post: Option<PostStage>,
    composite: CompositeStage,
}

impl Pipeline {
    /// Allocate both pairs, upload `initial` into both state buffers and
    /// build every stage. `target_format` is the format CompositeStage
    /// renders into (the surface, or an offscreen texture).
    pub fn new(
        gpu: &GpuContext,
        config: &SimConfig,
        initial: &[ParticleState],
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if initial.len() != config.particle_count as usize {
            return Err(SetupError::InvalidConfig(format!(
                "expected {} initial states, got {}",
                config.particle_count,
                initial.len()
            ))
            .into());
        }

        let frame_uniforms = FrameUniforms::from_config(config);
        let uniforms = UniformBlock::new(&gpu.device, &frame_uniforms);
        let states = StateBuffers::new(gpu, initial)?;
        let trail = TrailTarget::new(gpu, config.width, config.height)?;

        let update = UpdateStage::new(gpu, config.variant, &uniforms, &states, &trail)?;
        let draw = DrawStage::new(gpu, &uniforms, config.trail_policy, config.trail_blend)?;
        let post = if config.has_post() {
            Some(PostStage::new(gpu, &uniforms, &trail)?)
        } else {
            None
        };
        let composite = CompositeStage::new(gpu, &trail, target_format)?;

        log::info!(
            "Pipeline ready: {} particles, {}x{} trail, {:?} variant, {:?} trail policy",
            config.particle_count,
            config.width,
            config.height,
            config.variant,
            config.trail_policy
        );

        Ok(Self {
            frame_uniforms,
            uniforms,
            states,
            trail,
            update,
            draw,
            post,
            composite,
        })
    }

    /// Upload the per-frame uniform values. Takes effect for every pass of
    /// the next submission.
    pub fn write_uniforms(&mut self, queue: &wgpu::Queue, delta_time: f32, time: f32, frame: u64) {
        self.frame_uniforms.set_frame(delta_time, time, frame);
        self.uniforms.write(queue, &self.frame_uniforms);
    }

    /// Advance every particle from the read-role buffer into the write-role
    /// buffer.
    pub fn encode_update(&self, encoder: &mut wgpu::CommandEncoder) {
        let (input, output) = self.states.split();
        self.update.run(encoder, input, output, self.trail.read());
    }

    pub fn swap_states(&mut self) {
        self.states.swap();
    }

    /// Draw the read-role state buffer (the one just written, once
    /// [`swap_states`](Self::swap_states) has run) into the write-role trail
    /// texture.
    pub fn encode_draw(&self, encoder: &mut wgpu::CommandEncoder) {
        self.draw
            .run(encoder, &self.uniforms, self.states.read(), self.trail.write());
    }

    pub fn swap_trail(&mut self) {
        self.trail.swap();
    }

    /// Diffuse and decay the read-role trail into the write-role texture.
    /// Does nothing for a pipeline built without a post stage.
    pub fn encode_post(&self, encoder: &mut wgpu::CommandEncoder) {
        if let Some(post) = &self.post {
            let (source, target) = self.trail.split();
            post.run(encoder, &self.uniforms, source, target);
        }
    }

    /// Composite the read-role trail texture onto `target`.
    pub fn encode_composite(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        self.composite.run(encoder, self.trail.read(), target);
    }

    pub fn has_post(&self) -> bool {
        self.post.is_some()
    }

    pub fn states(&self) -> &StateBuffers {
        &self.states
    }

    pub fn trail(&self) -> &TrailTarget {
        &self.trail
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.composite.target_format()
    }

    pub fn particle_count(&self) -> u32 {
        self.states.read().len()
    }
}
