//! GPU resources and the four stages of a frame.
//!
//! [`GpuContext`] owns the device and queue. [`pipeline::Pipeline`] owns every
//! resource built from the configuration: the state buffer pair, the trail
//! texture pair, the uniform block and one object per stage.

pub mod composite;
pub mod draw;
pub mod pipeline;
pub mod post_process;
pub mod readback;
pub mod state_buffers;
pub mod trail_target;
pub mod update;

use std::sync::{Arc, Mutex};

use crate::error::{ResourceExhaustion, SetupError};
use crate::particle::ParticleState;

/// Format of both trail textures.
pub const TRAIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const WORKGROUP_SIZE: u32 = 256;

/// Holds the first asynchronous device problem until a frame picks it up.
///
/// Both the uncaptured-error handler and the device-lost callback write
/// here; later reports are dropped until [`take`](Self::take) empties it.
#[derive(Clone, Default)]
pub struct DeviceErrorSink(Arc<Mutex<Option<String>>>);

impl DeviceErrorSink {
    pub fn record(&self, message: String) {
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert(message);
        }
    }

    pub fn take(&self) -> Option<String> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Device, queue and the error sink for problems reported asynchronously.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    device_error: DeviceErrorSink,
}

impl GpuContext {
    /// Create a device able to present to `surface`.
    pub async fn for_surface(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<(Self, wgpu::Adapter), SetupError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SetupError::NoAdapter)?;
        let context = Self::from_adapter(&adapter).await?;
        Ok((context, adapter))
    }

    /// Create a device with no surface, for offscreen frames.
    pub async fn headless() -> Result<Self, SetupError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SetupError::NoAdapter)?;
        Self::from_adapter(&adapter).await
    }

    async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, SetupError> {
        let adapter_info = adapter.get_info();
        log::info!(
            "Using adapter {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        // Ask for everything the adapter offers so large populations fit.
        let required_limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Trailsim Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let device_error = DeviceErrorSink::default();
        let sink = device_error.clone();
        device.on_uncaptured_error(Box::new(move |err: wgpu::Error| {
            log::error!("Uncaptured GPU error: {err}");
            sink.record(err.to_string());
        }));
        let sink = device_error.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({reason:?}): {message}");
            sink.record(format!("device lost ({reason:?}): {message}"));
        });

        Ok(Self {
            device,
            queue,
            adapter_info,
            device_error,
        })
    }

    /// The first uncaptured device error since the last call, if any.
    pub fn take_device_error(&self) -> Option<String> {
        self.device_error.take()
    }

    /// Compile a WGSL module, turning validation failures into [`SetupError::Shader`].
    pub fn compile_shader(&self, label: &str, source: &str) -> Result<wgpu::ShaderModule, SetupError> {
        self.validated(label, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })
    }

    /// Run `create` inside a validation error scope.
    ///
    /// Used for pipeline creation, where entry points and bind group layouts
    /// are linked against the shader.
    pub fn validated<T>(
        &self,
        label: &str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, SetupError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            None => Ok(value),
            Some(err) => Err(SetupError::Shader {
                label: label.to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Run `create` inside an out-of-memory error scope.
    pub fn allocate<T>(
        &self,
        label: &str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, ResourceExhaustion> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            None => Ok(value),
            Some(err) => Err(ResourceExhaustion::Allocation {
                label: label.to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Check that one state buffer for `particles` fits the device limits.
    pub fn check_state_capacity(&self, particles: u32) -> Result<(), ResourceExhaustion> {
        let limits = self.device.limits();
        let bytes = particles as u64 * ParticleState::SIZE;
        let limit = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        if bytes > limit {
            return Err(ResourceExhaustion::StateBuffer {
                particles,
                bytes,
                limit,
            });
        }
        // Dispatch size is bounded too.
        let workgroups = particles.div_ceil(WORKGROUP_SIZE);
        if workgroups > limits.max_compute_workgroups_per_dimension {
            return Err(ResourceExhaustion::StateBuffer {
                particles,
                bytes,
                limit: limits.max_compute_workgroups_per_dimension as u64
                    * WORKGROUP_SIZE as u64
                    * ParticleState::SIZE,
            });
        }
        Ok(())
    }

    /// Check that a `width` x `height` trail texture fits the device limits.
    pub fn check_texture_capacity(&self, width: u32, height: u32) -> Result<(), ResourceExhaustion> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(ResourceExhaustion::TrailTexture {
                width,
                height,
                limit,
            });
        }
        Ok(())
    }
}

/// Layout entry for a sampled float texture.
pub(crate) fn texture_layout_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Layout entry for a storage buffer.
pub(crate) fn storage_layout_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
