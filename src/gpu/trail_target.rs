//! The trail texture pair and the offscreen target.
//!
//! One texture is the draw stage's render attachment (write role), the other
//! is bound for sampling by the update, post and composite stages (read
//! role). Each texture carries a sampling bind group built once at setup;
//! swapping roles selects the other texture's view and bind group.

use super::{texture_layout_entry, GpuContext, TRAIL_FORMAT};
use crate::error::ResourceExhaustion;
use crate::roles::{PingPong, Slot};

/// One trail texture with its view and sampling bind group.
pub struct TrailTexture {
    slot: Slot,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sample_group: wgpu::BindGroup,
}

impl TrailTexture {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// View used when this texture is the render attachment.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Bind group sampling this texture, for [`TrailTarget::sample_layout`].
    pub fn sample_group(&self) -> &wgpu::BindGroup {
        &self.sample_group
    }
}

pub struct TrailTarget {
    pair: PingPong<TrailTexture>,
    sample_layout: wgpu::BindGroupLayout,
    _sampler: wgpu::Sampler,
}

impl TrailTarget {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Result<Self, ResourceExhaustion> {
        gpu.check_texture_capacity(width, height)?;
        let device = &gpu.device;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Trail Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let sample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Trail Sample Bind Group Layout"),
            entries: &[
                texture_layout_entry(
                    0,
                    wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::FRAGMENT,
                ),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pair = PingPong::try_from_fn(|slot| {
            let label = format!("Trail Texture {}", slot.label());
            let texture = gpu.allocate(&label, |device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: TRAIL_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                })
            })?;
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let sample_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Trail Sample Bind Group {}", slot.label())),
                layout: &sample_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            });
            Ok(TrailTexture {
                slot,
                texture,
                view,
                sample_group,
            })
        })?;

        Ok(Self {
            pair,
            sample_layout,
            _sampler: sampler,
        })
    }

    /// Layout shared by every stage that samples the trail.
    pub fn sample_layout(&self) -> &wgpu::BindGroupLayout {
        &self.sample_layout
    }

    /// Texture sampled this frame: the accumulated trail so far.
    pub fn read(&self) -> &TrailTexture {
        self.pair.read()
    }

    /// Texture the draw stage renders into.
    pub fn write(&self) -> &TrailTexture {
        self.pair.write()
    }

    pub fn split(&self) -> (&TrailTexture, &TrailTexture) {
        self.pair.split()
    }

    pub fn read_slot(&self) -> Slot {
        self.pair.read_slot()
    }

    pub fn get(&self, slot: Slot) -> &TrailTexture {
        self.pair.get(slot)
    }

    /// The texture just rendered into becomes the sampled one and the
    /// previous sampled texture becomes the next render attachment.
    pub fn swap(&mut self) {
        self.pair.swap();
    }
}
