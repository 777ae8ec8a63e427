use crate::{
    config::CLEAR_COLOR,
    core::{
        buffers::VertexBuffer, pipeline::Pipeline, queues::QueueFamilies,
        swapchain::{Framebuffers, Swapchain},
    },
    error::RenderError,
};

use vulkanalia::prelude::v1_0::*;
use log::*;

/// The command pool and one primary command buffer per swapchain
/// image, each recorded once with the whole frame.
#[derive(Clone, Debug)]
pub struct Commands {
    pub pool: vk::CommandPool,
    pub buffers: Vec<vk::CommandBuffer>,
}

impl Commands {
    pub unsafe fn create(
        device: &Device,
        queue_families: &QueueFamilies,
        image_count: usize,
    ) -> Result<Self, RenderError> {
        // Commands are not executed directly but recorded in command
        // buffers, which are allocated from a pool tied to the queue
        // family they will be submitted to. The buffers are recorded
        // once and never reset, so the pool needs no flags.
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::empty())
            .queue_family_index(queue_families.graphics);

        let pool = device
            .create_command_pool(&info, None)
            .map_err(|e| RenderError::Initialization("command pool", e))?;

        // A buffer that is pending execution cannot be submitted
        // again, so each image gets its own.
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(image_count as u32);

        let buffers = match device.allocate_command_buffers(&allocate_info) {
            Ok(buffers) => buffers,
            Err(e) => {
                device.destroy_command_pool(pool, None);
                return Err(RenderError::ResourceAllocation("command buffers", e));
            }
        };

        info!("Command pool created with {} command buffers.", buffers.len());
        Ok(Self { pool, buffers })
    }

    /// Records the fixed frame for each image: clear, draw the
    /// vertex buffer, done.
    pub unsafe fn record(
        &self,
        device: &Device,
        swapchain: &Swapchain,
        render_pass: vk::RenderPass,
        pipeline: &Pipeline,
        framebuffers: &Framebuffers,
        vertex_buffer: &VertexBuffer,
    ) -> Result<(), RenderError> {
        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(swapchain.extent);

        let clear_values = &[vk::ClearValue {
            color: vk::ClearColorValue { float32: CLEAR_COLOR },
        }];

        for (i, &command_buffer) in self.buffers.iter().enumerate() {
            let begin_info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RenderError::Recording)?;

            let info = vk::RenderPassBeginInfo::builder()
                .render_pass(render_pass)
                .framebuffer(framebuffers.handles[i])
                .render_area(render_area)
                .clear_values(clear_values);

            device.cmd_begin_render_pass(command_buffer, &info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.handle);
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer.buffer], &[0]);
            device.cmd_draw(command_buffer, vertex_buffer.vertex_count, 1, 0, 0);
            device.cmd_end_render_pass(command_buffer);

            device
                .end_command_buffer(command_buffer)
                .map_err(RenderError::Recording)?;
        }

        debug!("Recorded {} command buffers.", self.buffers.len());
        Ok(())
    }

    /// Frees the buffers along with the pool.
    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_command_pool(self.pool, None);
    }
}
