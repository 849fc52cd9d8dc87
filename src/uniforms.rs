//! The per-frame uniform block shared by every stage.
//!
//! One buffer, rewritten once per frame before the frame's commands are
//! submitted. Every pass recorded for that frame therefore sees the same
//! delta time and frame index.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::config::SimConfig;

/// Host copy of the uniform block. Layout matches [`UNIFORMS_WGSL`].
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub canvas: [f32; 2],
    pub delta_time: f32,
    pub time: f32,
    pub frame: u32,
    pub particle_count: u32,
    pub wrap_mode: u32,
    pub randomness: u32,
    pub sensor_angle: f32,
    pub sensor_distance: f32,
    pub turn_speed: f32,
    pub decay_rate: f32,
    pub diffuse_rate: f32,
    pub _pad: [u32; 3],
    pub color: [f32; 4],
}

const _: () = assert!(
    std::mem::size_of::<FrameUniforms>() == 80,
    "size of FrameUniforms does not match WGSL"
);
const _: () = assert!(
    std::mem::offset_of!(FrameUniforms, color) == 64,
    "offset of FrameUniforms.color does not match WGSL"
);

/// WGSL declaration matching [`FrameUniforms`].
pub const UNIFORMS_WGSL: &str = r#"
struct FrameUniforms {
    canvas: vec2<f32>,
    delta_time: f32,
    time: f32,
    frame: u32,
    particle_count: u32,
    wrap_mode: u32,
    randomness: u32,
    sensor_angle: f32,
    sensor_distance: f32,
    turn_speed: f32,
    decay_rate: f32,
    diffuse_rate: f32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
    color: vec4<f32>,
};
"#;

impl FrameUniforms {
    /// Constant part of the block, from the startup configuration.
    pub fn from_config(config: &SimConfig) -> Self {
        let color = if config.has_post() {
            config.agent.deposit
        } else {
            config.draw_color
        };
        Self {
            canvas: config.dimensions(),
            delta_time: 0.0,
            time: 0.0,
            frame: 0,
            particle_count: config.particle_count,
            wrap_mode: config.wrap.as_u32(),
            randomness: config.agent.randomness as u32,
            sensor_angle: config.agent.sensor_angle,
            sensor_distance: config.agent.sensor_distance,
            turn_speed: config.agent.turn_speed,
            decay_rate: config.post.decay_rate,
            diffuse_rate: config.post.diffuse_rate,
            _pad: [0; 3],
            color,
        }
    }

    /// Per-frame part of the block.
    pub fn set_frame(&mut self, delta_time: f32, time: f32, frame: u64) {
        self.delta_time = delta_time;
        self.time = time;
        // The shader only hashes the frame index; wrapping is fine.
        self.frame = frame as u32;
    }
}

/// Uniform buffer plus the bind group the draw and post stages use.
pub struct UniformBlock {
    pub buffer: wgpu::Buffer,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl UniformBlock {
    pub fn new(device: &wgpu::Device, initial: &FrameUniforms) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::bytes_of(initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Uniform Bind Group Layout"),
            entries: &[uniform_layout_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Uniform Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniforms));
    }
}

/// Layout entry for the uniform block at `binding`.
pub fn uniform_layout_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<FrameUniforms>() as u64),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Variant, WrapMode};

    #[test]
    fn test_from_config_picks_color_by_variant() {
        let simple = SimConfig::default();
        assert_eq!(FrameUniforms::from_config(&simple).color, simple.draw_color);

        let extended = SimConfig {
            variant: Variant::Extended,
            ..Default::default()
        };
        assert_eq!(
            FrameUniforms::from_config(&extended).color,
            extended.agent.deposit
        );
    }

    #[test]
    fn test_from_config_copies_constants() {
        let config = SimConfig {
            particle_count: 4,
            width: 2,
            height: 3,
            wrap: WrapMode::Clamped,
            ..Default::default()
        };
        let uniforms = FrameUniforms::from_config(&config);
        assert_eq!(uniforms.canvas, [2.0, 3.0]);
        assert_eq!(uniforms.particle_count, 4);
        assert_eq!(uniforms.wrap_mode, 1);
        assert_eq!(uniforms.delta_time, 0.0);
    }

    #[test]
    fn test_set_frame() {
        let mut uniforms = FrameUniforms::from_config(&SimConfig::default());
        uniforms.set_frame(0.5, 3.0, u32::MAX as u64 + 2);
        assert_eq!(uniforms.delta_time, 0.5);
        assert_eq!(uniforms.time, 3.0);
        assert_eq!(uniforms.frame, 1);
    }
}
