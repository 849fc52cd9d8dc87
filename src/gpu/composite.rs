//! The composite stage: present the accumulated trail.
//!
//! Samples the read-role trail texture and writes it over the whole target.
//! The trail is only read, so compositing twice without a draw in between
//! produces the same image.

use super::trail_target::{TrailTarget, TrailTexture};
use super::GpuContext;
use crate::error::SetupError;
use crate::shader_utils::{trail_bindings_wgsl, FULLSCREEN_VS_WGSL};

pub struct CompositeStage {
    pipeline: wgpu::RenderPipeline,
    target_format: wgpu::TextureFormat,
}

impl CompositeStage {
    pub fn new(
        gpu: &GpuContext,
        trail: &TrailTarget,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, SetupError> {
        let shader = gpu.compile_shader("Composite Shader", &generate_shader())?;

        let pipeline = gpu.validated("Composite Pipeline", |device| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Composite Pipeline Layout"),
                bind_group_layouts: &[trail.sample_layout()],
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Composite Pipeline"),
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
                        format: target_format,
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

        Ok(Self {
            pipeline,
            target_format,
        })
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Copy `source` onto `target`.
    pub fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &TrailTexture,
        target: &wgpu::TextureView,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, source.sample_group(), &[]);
        render_pass.draw(0..3, 0..1);
    }
}

fn generate_shader() -> String {
    format!(
        r#"{trail}
{FULLSCREEN_VS_WGSL}

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {{
    let color = textureSample(trail, trail_sampler, in.uv);
    return vec4<f32>(color.rgb, 1.0);
}}
"#,
        trail = trail_bindings_wgsl(0)
    )
}
