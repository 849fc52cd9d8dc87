//! The particle state buffer pair.

use wgpu::util::DeviceExt;

use super::GpuContext;
use crate::error::ResourceExhaustion;
use crate::particle::ParticleState;
use crate::roles::{PingPong, Slot};

/// One GPU-resident array of [`ParticleState`].
pub struct StateBuffer {
    slot: Slot,
    buffer: wgpu::Buffer,
    len: u32,
}

impl StateBuffer {
    fn new(gpu: &GpuContext, slot: Slot, initial: &[ParticleState]) -> Result<Self, ResourceExhaustion> {
        let label = format!("Particle State Buffer {}", slot.label());
        let buffer = gpu.allocate(&label, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents: bytemuck::cast_slice(initial),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::COPY_SRC,
            })
        })?;
        Ok(Self {
            slot,
            buffer,
            len: initial.len() as u32,
        })
    }

    /// Fixed identity of this buffer within its pair.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Number of particles.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_size(&self) -> u64 {
        self.len as u64 * ParticleState::SIZE
    }
}

/// Both state buffers and their role assignment.
///
/// Both start with the same initial population, so whichever is read first
/// holds valid data.
pub struct StateBuffers {
    pair: PingPong<StateBuffer>,
}

impl StateBuffers {
    pub fn new(gpu: &GpuContext, initial: &[ParticleState]) -> Result<Self, ResourceExhaustion> {
        gpu.check_state_capacity(initial.len() as u32)?;
        let pair = PingPong::try_from_fn(|slot| StateBuffer::new(gpu, slot, initial))?;
        log::debug!(
            "Allocated state buffers: 2 x {} bytes",
            pair.read().byte_size()
        );
        Ok(Self { pair })
    }

    /// `(read, write)`: the update stage's input and capture target.
    pub fn split(&self) -> (&StateBuffer, &StateBuffer) {
        self.pair.split()
    }

    /// The buffer holding the most recent state once the frame's swap is done.
    pub fn read(&self) -> &StateBuffer {
        self.pair.read()
    }

    pub fn write(&self) -> &StateBuffer {
        self.pair.write()
    }

    pub fn get(&self, slot: Slot) -> &StateBuffer {
        self.pair.get(slot)
    }

    pub fn read_slot(&self) -> Slot {
        self.pair.read_slot()
    }

    pub fn write_slot(&self) -> Slot {
        self.pair.write_slot()
    }

    pub fn swap(&mut self) {
        self.pair.swap();
    }
}
