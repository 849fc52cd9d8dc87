//! Per-particle state as stored on the GPU.

use bytemuck::{Pod, Zeroable};

/// One particle: a position in canvas pixels and a secondary attribute.
///
/// In the simple variant `secondary` is a velocity in pixels per second. In
/// the extended variant it is `(angle, speed)`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct ParticleState {
    pub position: [f32; 2],
    pub secondary: [f32; 2],
}

const _: () = assert!(
    std::mem::size_of::<ParticleState>() == 16,
    "size of ParticleState does not match WGSL"
);
const _: () = assert!(
    std::mem::offset_of!(ParticleState, secondary) == 8,
    "offset of ParticleState.secondary does not match WGSL"
);

/// WGSL declaration matching [`ParticleState`].
pub const PARTICLE_WGSL: &str = r#"
struct ParticleState {
    position: vec2<f32>,
    secondary: vec2<f32>,
};
"#;

impl ParticleState {
    pub const SIZE: u64 = std::mem::size_of::<ParticleState>() as u64;

    pub fn new(position: [f32; 2], secondary: [f32; 2]) -> Self {
        Self {
            position,
            secondary,
        }
    }

    pub const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: std::mem::offset_of!(ParticleState, position) as u64,
            shader_location: 0,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: std::mem::offset_of!(ParticleState, secondary) as u64,
            shader_location: 1,
        },
    ];

    /// One vertex per particle; the draw stage rasterizes each as a point.
    pub const fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ParticleState::VERTEX_ATTRIBUTES,
        }
    }
}
