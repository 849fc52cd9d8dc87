//! Copies of GPU resources back to the host.
//!
//! Never used on the frame path. Tests and diagnostics use these to inspect
//! state buffers and rendered images; each call submits its own copy and
//! blocks until the device is done.

use std::sync::mpsc;

use super::state_buffers::StateBuffer;
use super::GpuContext;
use crate::error::FrameError;
use crate::particle::ParticleState;

/// Read every particle in `states`.
pub fn read_states(gpu: &GpuContext, states: &StateBuffer) -> Result<Vec<ParticleState>, FrameError> {
    let size = states.byte_size();
    if size == 0 {
        return Ok(Vec::new());
    }

    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("State Readback Buffer"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("State Readback Encoder"),
        });
    encoder.copy_buffer_to_buffer(states.buffer(), 0, &staging, 0, size);
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let bytes = map_and_read(gpu, &staging)?;
    Ok(bytes
        .chunks_exact(ParticleState::SIZE as usize)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// Read the first mip level of `texture` as raw texels, rows tightly packed.
///
/// The texel size comes from the texture's format; formats with no single
/// copy size (depth-stencil, compressed) are rejected.
pub fn read_texture(gpu: &GpuContext, texture: &wgpu::Texture) -> Result<Vec<u8>, FrameError> {
    let format = texture.format();
    let bytes_per_texel = format
        .block_copy_size(None)
        .filter(|_| format.block_dimensions() == (1, 1))
        .ok_or(FrameError::UnreadableFormat(format))?;
    let width = texture.width();
    let height = texture.height();
    let unpadded = width * bytes_per_texel;
    // Must be aligned to COPY_BYTES_PER_ROW_ALIGNMENT (256)
    let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Readback Buffer"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Texture Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let bytes = map_and_read(gpu, &staging)?;
    let mut pixels = Vec::with_capacity((unpadded * height) as usize);
    for row in bytes.chunks_exact(padded as usize) {
        pixels.extend_from_slice(&row[..unpadded as usize]);
    }
    Ok(pixels)
}

fn map_and_read(gpu: &GpuContext, staging: &wgpu::Buffer) -> Result<Vec<u8>, FrameError> {
    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    gpu.device.poll(wgpu::Maintain::Wait);

    match receiver.recv() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(FrameError::BufferMapping(err.to_string())),
        Err(_) => {
            return Err(FrameError::BufferMapping(
                "map callback was dropped".to_string(),
            ))
        }
    }

    let bytes = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(bytes)
}
