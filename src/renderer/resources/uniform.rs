use std::marker::PhantomData;
use ash::vk;
use bytemuck::Pod;
use color_eyre::Result;
use gpu_allocator::MemoryLocation;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::resources::buffer::Buffer;

/// Host-visible uniform buffer holding a single `T`
pub struct Uniform<T: Pod> {
    buffer: Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> Uniform<T> {
    pub fn new(initial: &T, dev: &RenderDevice) -> Result<Self> {
        let buffer = dev.create_buffer(
            size_of::<T>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            "Uniform buffer",
            MemoryLocation::CpuToGpu,
        )?;
        let mut uniform = Self {
            buffer,
            _marker: PhantomData,
        };
        uniform.set(initial)?;
        Ok(uniform)
    }

    pub fn set(&mut self, value: &T) -> Result<()> {
        self.buffer.write(std::slice::from_ref(value), 0)?;
        Ok(())
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        size_of::<T>() as vk::DeviceSize
    }
}
