//! The draw stage: rasterize particles as points into the trail texture.
//!
//! The just-written state buffer is bound as the vertex buffer, one vertex
//! per particle. Positions are in pixel space and are mapped to the centre
//! of their texel in clip space.

use super::state_buffers::StateBuffer;
use super::trail_target::TrailTexture;
use super::{GpuContext, TRAIL_FORMAT};
use crate::config::{TrailBlend, TrailPolicy};
use crate::error::SetupError;
use crate::particle::ParticleState;
use crate::uniforms::{UniformBlock, UNIFORMS_WGSL};

impl TrailBlend {
    /// How a drawn point combines with what is already in the trail.
    pub fn to_blend_state(self) -> wgpu::BlendState {
        match self {
            TrailBlend::Replace => wgpu::BlendState::REPLACE,
            TrailBlend::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
            TrailBlend::Alpha => wgpu::BlendState::ALPHA_BLENDING,
        }
    }
}

impl TrailPolicy {
    /// Load operation for the trail attachment at the start of a draw.
    pub fn load_op(self) -> wgpu::LoadOp<wgpu::Color> {
        match self {
            TrailPolicy::Accumulate => wgpu::LoadOp::Load,
            TrailPolicy::Clear => wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        }
    }
}

pub struct DrawStage {
    pipeline: wgpu::RenderPipeline,
    load_op: wgpu::LoadOp<wgpu::Color>,
}

impl DrawStage {
    pub fn new(
        gpu: &GpuContext,
        uniforms: &UniformBlock,
        policy: TrailPolicy,
        blend: TrailBlend,
    ) -> Result<Self, SetupError> {
        let shader = gpu.compile_shader("Draw Shader", &generate_shader())?;

        let pipeline = gpu.validated("Draw Pipeline", |device| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Draw Pipeline Layout"),
                bind_group_layouts: &[&uniforms.layout],
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Draw Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[ParticleState::vertex_buffer_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TRAIL_FORMAT,
                        blend: Some(blend.to_blend_state()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        Ok(Self {
            pipeline,
            load_op: policy.load_op(),
        })
    }

    /// Draw every particle of `states` into `target`.
    pub fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &UniformBlock,
        states: &StateBuffer,
        target: &TrailTexture,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Draw Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: self.load_op,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &uniforms.bind_group, &[]);
        render_pass.set_vertex_buffer(0, states.buffer().slice(..));
        render_pass.draw(0..states.len(), 0..1);
    }
}

fn generate_shader() -> String {
    format!(
        r#"{UNIFORMS_WGSL}
@group(0) @binding(0)
var<uniform> uniforms: FrameUniforms;

@vertex
fn vs_main(
    @location(0) position: vec2<f32>,
    @location(1) secondary: vec2<f32>,
) -> @builtin(position) vec4<f32> {{
    let texel = floor(position) + vec2<f32>(0.5);
    let ndc = vec2<f32>(
        texel.x / uniforms.canvas.x * 2.0 - 1.0,
        1.0 - texel.y / uniforms.canvas.y * 2.0,
    );
    return vec4<f32>(ndc, 0.0, 1.0);
}}

@fragment
fn fs_main() -> @location(0) vec4<f32> {{
    return uniforms.color;
}}
"#
    )
}
