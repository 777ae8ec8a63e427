use std::{mem::size_of, ptr::copy_nonoverlapping as memcpy};

use crate::{
    core::{context::GraphicsContext, vertex::Vertex},
    error::RenderError,
};

use log::*;
use vulkanalia::prelude::v1_0::*;

/// Index of the first memory type allowed by `requirements` that
/// has all of `properties`.
pub fn find_memory_type(
    memory: &vk::PhysicalDeviceMemoryProperties,
    properties: vk::MemoryPropertyFlags,
    requirements: vk::MemoryRequirements,
) -> Result<u32, RenderError> {
    // Each bit of the requirements' type bits is set when the
    // memory type with that index can back the buffer.
    (0..memory.memory_type_count)
        .find(|&i| {
            requirements.memory_type_bits & (1 << i) != 0
                && memory.memory_types[i as usize].property_flags.contains(properties)
        })
        .ok_or(RenderError::NoCompatibleMemoryType)
}

pub unsafe fn create_buffer(
    context: &GraphicsContext,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> Result<(vk::Buffer, vk::DeviceMemory), RenderError> {
    let device = &context.device;

    // Only the graphics queue reads the buffer.
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = device
        .create_buffer(&buffer_info, None)
        .map_err(|e| RenderError::ResourceAllocation("buffer", e))?;

    let requirements = device.get_buffer_memory_requirements(buffer);
    let memory = context
        .instance
        .get_physical_device_memory_properties(context.physical_device);

    let memory_type = match find_memory_type(&memory, properties, requirements) {
        Ok(index) => index,
        Err(e) => {
            device.destroy_buffer(buffer, None);
            return Err(e);
        }
    };

    let memory_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);

    let buffer_memory = match device.allocate_memory(&memory_info, None) {
        Ok(memory) => memory,
        Err(e) => {
            device.destroy_buffer(buffer, None);
            return Err(RenderError::ResourceAllocation("buffer memory", e));
        }
    };

    if let Err(e) = device.bind_buffer_memory(buffer, buffer_memory, 0) {
        device.destroy_buffer(buffer, None);
        device.free_memory(buffer_memory, None);
        return Err(RenderError::ResourceAllocation("buffer memory binding", e));
    }

    Ok((buffer, buffer_memory))
}

/// The static geometry, kept in host-visible memory for the whole
/// run.
#[derive(Clone, Copy, Debug)]
pub struct VertexBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub vertex_count: u32,
}

impl VertexBuffer {
    pub unsafe fn create(context: &GraphicsContext, vertices: &[Vertex]) -> Result<Self, RenderError> {
        // HOST_VISIBLE so that it can be mapped, HOST_COHERENT so the
        // writes are visible to the device without explicit flushes.
        let size = (size_of::<Vertex>() * vertices.len()) as u64;
        let (buffer, memory) = create_buffer(
            context,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let vertex_buffer = Self {
            buffer,
            memory,
            vertex_count: vertices.len() as u32,
        };

        let device = &context.device;
        let mapped = match device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()) {
            Ok(mapped) => mapped,
            Err(e) => {
                vertex_buffer.destroy(device);
                return Err(RenderError::ResourceAllocation("vertex buffer mapping", e));
            }
        };

        memcpy(vertices.as_ptr(), mapped.cast(), vertices.len());
        device.unmap_memory(memory);

        info!("Vertex buffer created ({} vertices).", vertices.len());
        Ok(vertex_buffer)
    }

    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}
