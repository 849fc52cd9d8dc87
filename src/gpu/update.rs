//! The update stage: a stream transform from one state buffer to the other.
//!
//! A compute pass reads every particle from the input buffer through a
//! read-only binding and writes the advanced state into the output buffer.
//! Nothing is rasterized. One bind group per input slot is built at setup
//! (update-from-A captures into B, update-from-B captures into A); the stage
//! picks one by the input's slot and never rebuilds them.

use super::state_buffers::{StateBuffer, StateBuffers};
use super::trail_target::{TrailTarget, TrailTexture};
use super::{storage_layout_entry, GpuContext, WORKGROUP_SIZE};
use crate::config::Variant;
use crate::error::SetupError;
use crate::particle::PARTICLE_WGSL;
use crate::roles::{PingPong, Slot};
use crate::shader_utils::{trail_bindings_wgsl, COLOR_WGSL, HASH_WGSL, WRAP_WGSL};
use crate::uniforms::{uniform_layout_entry, UniformBlock, UNIFORMS_WGSL};

/// Reads one state buffer and writes the other.
///
/// `input` and `output` are separate borrows of separate buffers; the caller
/// gets them from [`StateBuffers::split`], so they can never be the same
/// storage.
pub trait StreamTransform {
    fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        input: &StateBuffer,
        output: &StateBuffer,
        trail: &TrailTexture,
    );
}

pub struct UpdateStage {
    pipeline: wgpu::ComputePipeline,
    /// Indexed by input slot.
    bindings: PingPong<wgpu::BindGroup>,
    samples_trail: bool,
    particle_count: u32,
}

impl UpdateStage {
    pub fn new(
        gpu: &GpuContext,
        variant: Variant,
        uniforms: &UniformBlock,
        states: &StateBuffers,
        trail: &TrailTarget,
    ) -> Result<Self, SetupError> {
        let device = &gpu.device;
        let shader = gpu.compile_shader("Update Shader", &generate_shader(variant))?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Bind Group Layout"),
            entries: &[
                uniform_layout_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_layout_entry(1, true),
                storage_layout_entry(2, false),
            ],
        });

        let bind_group_from = |input: Slot| {
            let output = input.other();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!(
                    "Update Bind Group {} -> {}",
                    input.label(),
                    output.label()
                )),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: states.get(input).buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: states.get(output).buffer().as_entire_binding(),
                    },
                ],
            })
        };
        let bindings = PingPong::new(bind_group_from(Slot::A), bind_group_from(Slot::B));

        let samples_trail = variant == Variant::Extended;
        let mut group_layouts = vec![&layout];
        if samples_trail {
            group_layouts.push(trail.sample_layout());
        }

        let pipeline = gpu.validated("Update Pipeline", |device| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Update Pipeline Layout"),
                bind_group_layouts: &group_layouts,
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Update Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;

        Ok(Self {
            pipeline,
            bindings,
            samples_trail,
            particle_count: states.read().len(),
        })
    }
}

impl StreamTransform for UpdateStage {
    fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        input: &StateBuffer,
        output: &StateBuffer,
        trail: &TrailTexture,
    ) {
        debug_assert_eq!(output.slot(), input.slot().other());

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Update Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.bindings.get(input.slot()), &[]);
        if self.samples_trail {
            pass.set_bind_group(1, trail.sample_group(), &[]);
        }
        let workgroups = self.particle_count.div_ceil(WORKGROUP_SIZE);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }
}

/// Generate the update compute shader for `variant`.
pub fn generate_shader(variant: Variant) -> String {
    let (extra, body) = match variant {
        Variant::Simple => (String::new(), SIMPLE_BODY),
        Variant::Extended => (
            format!("{}{COLOR_WGSL}{AGENT_SENSE}", trail_bindings_wgsl(1)),
            AGENT_BODY,
        ),
    };

    format!(
        r#"{UNIFORMS_WGSL}
{PARTICLE_WGSL}
@group(0) @binding(0)
var<uniform> uniforms: FrameUniforms;
@group(0) @binding(1)
var<storage, read> state_in: array<ParticleState>;
@group(0) @binding(2)
var<storage, read_write> state_out: array<ParticleState>;
{WRAP_WGSL}
{HASH_WGSL}
{extra}
@compute @workgroup_size({WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    if index >= uniforms.particle_count {{
        return;
    }}

    let p = state_in[index];
    var next: ParticleState;
{body}
    state_out[index] = next;
}}
"#
    )
}

const SIMPLE_BODY: &str = r#"
    next.position = wrap_position(p.position + p.secondary * uniforms.delta_time);
    next.secondary = p.secondary;
"#;

const AGENT_SENSE: &str = r#"
fn sense(position: vec2<f32>, angle: f32) -> f32 {
    let at = wrap_position(position + vec2<f32>(cos(angle), sin(angle)) * uniforms.sensor_distance);
    let uv = (floor(at) + vec2<f32>(0.5)) / uniforms.canvas;
    return luminance(textureSampleLevel(trail, trail_sampler, uv, 0.0).rgb);
}
"#;

const AGENT_BODY: &str = r#"
    var angle = p.secondary.x;
    let speed = p.secondary.y;

    let forward = sense(p.position, angle);
    let left = sense(p.position, angle + uniforms.sensor_angle);
    let right = sense(p.position, angle - uniforms.sensor_angle);

    let turn = uniforms.turn_speed * uniforms.delta_time;
    var jitter = 0.5;
    if uniforms.randomness != 0u {
        jitter = hash_unit(hash_u32(index ^ hash_u32(uniforms.frame)));
    }

    if forward > left && forward > right {
        // keep heading
    } else if forward < left && forward < right {
        angle += (jitter - 0.5) * 2.0 * turn;
    } else if right > left {
        angle -= turn;
    } else if left > right {
        angle += turn;
    }

    let heading = vec2<f32>(cos(angle), sin(angle));
    next.position = wrap_position(p.position + heading * speed * uniforms.delta_time);
    next.secondary = vec2<f32>(angle, speed);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader_utils::validate_wgsl;

    #[test]
    fn test_simple_shader_validates() {
        let wgsl = generate_shader(Variant::Simple);
        assert!(wgsl.contains("var<storage, read> state_in"));
        assert!(wgsl.contains("var<storage, read_write> state_out"));
        assert!(!wgsl.contains("texture_2d"));
        validate_wgsl(&wgsl).expect("simple update shader should be valid");
    }

    #[test]
    fn test_extended_shader_validates() {
        let wgsl = generate_shader(Variant::Extended);
        assert!(wgsl.contains("@group(1) @binding(0)"));
        assert!(wgsl.contains("sensor_angle"));
        validate_wgsl(&wgsl).expect("extended update shader should be valid");
    }

    #[test]
    fn test_shader_never_writes_input() {
        for variant in [Variant::Simple, Variant::Extended] {
            let wgsl = generate_shader(variant);
            assert!(!wgsl.contains("state_in[index] ="));
        }
    }
}
