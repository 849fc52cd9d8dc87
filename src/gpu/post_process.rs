//! Post-processing of the trail for the extended variant.
//!
//! A full-screen pass samples the read-role trail texture and renders a
//! diffused, decayed copy into the write-role texture. The next frame's
//! draw loads that copy and deposits on top of it, so trails spread and
//! fade over time.

use super::trail_target::{TrailTarget, TrailTexture};
use super::{GpuContext, TRAIL_FORMAT};
use crate::error::SetupError;
use crate::shader_utils::{trail_bindings_wgsl, FULLSCREEN_VS_WGSL};
use crate::uniforms::{UniformBlock, UNIFORMS_WGSL};

pub struct PostStage {
    pipeline: wgpu::RenderPipeline,
}

impl PostStage {
    pub fn new(
        gpu: &GpuContext,
        uniforms: &UniformBlock,
        trail: &TrailTarget,
    ) -> Result<Self, SetupError> {
        let shader = gpu.compile_shader("Post-Process Shader", &generate_shader())?;

        let pipeline = gpu.validated("Post-Process Pipeline", |device| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Post-Process Pipeline Layout"),
                bind_group_layouts: &[&uniforms.layout, trail.sample_layout()],
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Post-Process Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TRAIL_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        Ok(Self { pipeline })
    }

    /// Render the processed `source` into `target`. Every texel of `target`
    /// is overwritten.
    pub fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &UniformBlock,
        source: &TrailTexture,
        target: &TrailTexture,
    ) {
        debug_assert_ne!(source.slot(), target.slot());

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Post-Process Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &uniforms.bind_group, &[]);
        render_pass.set_bind_group(1, source.sample_group(), &[]);
        render_pass.draw(0..3, 0..1);
    }
}

fn generate_shader() -> String {
    format!(
        r#"{UNIFORMS_WGSL}
@group(0) @binding(0)
var<uniform> uniforms: FrameUniforms;
{trail}
{FULLSCREEN_VS_WGSL}

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {{
    let size = vec2<i32>(textureDimensions(trail));
    let texel = vec2<i32>(floor(in.clip_position.xy));

    var sum = vec4<f32>(0.0);
    for (var dy = -1; dy <= 1; dy++) {{
        for (var dx = -1; dx <= 1; dx++) {{
            let at = clamp(texel + vec2<i32>(dx, dy), vec2<i32>(0), size - vec2<i32>(1));
            sum += textureLoad(trail, at, 0);
        }}
    }}
    let blurred = sum / 9.0;

    let original = textureLoad(trail, texel, 0);
    let diffused = mix(original, blurred, clamp(uniforms.diffuse_rate * uniforms.delta_time, 0.0, 1.0));
    return max(vec4<f32>(0.0), diffused - uniforms.decay_rate * uniforms.delta_time);
}}
"#,
        trail = trail_bindings_wgsl(1)
    )
}
