use crate::{
    config::*,
    core::{
        buffers::VertexBuffer,
        commands::Commands,
        context::GraphicsContext,
        frame::{FrameBackend, FrameSynchronizer},
        pipeline::{create_render_pass, Pipeline},
        shaders::read_shader,
        swapchain::{Framebuffers, Swapchain},
        sync::FrameSlot,
        teardown::Teardown,
        vertex::{Vertex, VERTICES},
    },
    error::RenderError,
};

use anyhow::Result;
use log::*;
use vulkanalia::{prelude::v1_0::*, vk::KhrSwapchainExtension};
use winit::window::Window;

pub struct Renderer {
    // - Context: instance, surface, physical and logical devices
    //   with their queues
    // - Swapchain: the presentable images and their views
    // - Commands: one pre-recorded command buffer per image
    // - Slots: the synchronization objects of each frame in flight
    // - Sync: which slot is next and which slot owns which image
    // - Teardown: the destroy actions of everything above, in
    //   construction order
    context: GraphicsContext,
    swapchain: Swapchain,
    commands: Commands,
    slots: Vec<FrameSlot>,
    sync: FrameSynchronizer,
    teardown: Teardown,
}

/// Pushes a destroy action that needs the logical device.
fn defer(
    teardown: &mut Teardown,
    label: &'static str,
    device: &Device,
    destroy: impl FnOnce(&Device) + 'static,
) {
    let device = device.clone();
    teardown.push(label, move || destroy(&device));
}

/// Labels of the destroy actions `Renderer::create` pushes, in
/// construction order. Unwinding runs them back to front.
fn construction_order(validation: bool, slot_count: usize) -> Vec<&'static str> {
    let mut labels = vec!["instance"];
    if validation {
        labels.push("debug messenger");
    }
    labels.extend([
        "surface",
        "logical device",
        "vertex buffer",
        "swapchain",
        "render pass",
        "pipeline",
        "framebuffers",
        "command pool",
    ]);
    labels.extend(std::iter::repeat("frame slot").take(slot_count));
    labels
}

impl Renderer {
    pub unsafe fn create(window: &Window) -> Result<Self> {
        // Every object pushes its destroy action right after it is
        // created. If anything fails from here on, dropping the
        // stack destroys whatever was already built.
        let mut teardown = Teardown::default();
        let context = GraphicsContext::create(window, &mut teardown)?;
        let device = &context.device;

        // The geometry doesn't depend on the swapchain, and only
        // needs the device.
        let vertex_buffer = VertexBuffer::create(&context, &VERTICES)?;
        defer(&mut teardown, "vertex buffer", device, move |d| unsafe {
            vertex_buffer.destroy(d)
        });

        let size = window.inner_size();
        let desired = vk::Extent2D {
            width: size.width,
            height: size.height,
        };
        let swapchain = Swapchain::create(&context, desired)?;
        defer(&mut teardown, "swapchain", device, {
            let swapchain = swapchain.clone();
            move |d| unsafe { swapchain.destroy(d) }
        });

        let render_pass = create_render_pass(device, swapchain.format)?;
        defer(&mut teardown, "render pass", device, move |d| unsafe {
            d.destroy_render_pass(render_pass, None)
        });

        // The bytecode is only needed until the pipeline exists.
        let vertex_shader = read_shader(VERTEX_SHADER_PATH)?;
        let fragment_shader = read_shader(FRAGMENT_SHADER_PATH)?;
        let pipeline = Pipeline::create(
            device,
            render_pass,
            swapchain.extent,
            &vertex_shader,
            &fragment_shader,
            &Vertex::layout(),
        )?;
        defer(&mut teardown, "pipeline", device, move |d| unsafe {
            pipeline.destroy(d)
        });

        let framebuffers = Framebuffers::create(device, &swapchain, render_pass)?;
        defer(&mut teardown, "framebuffers", device, {
            let framebuffers = framebuffers.clone();
            move |d| unsafe { framebuffers.destroy(d) }
        });

        // Nothing in the frame ever changes, so every command
        // buffer is recorded once here instead of every frame.
        let commands = Commands::create(device, &context.queue_families, swapchain.len())?;
        defer(&mut teardown, "command pool", device, {
            let commands = commands.clone();
            move |d| unsafe { commands.destroy(d) }
        });
        commands.record(
            device,
            &swapchain,
            render_pass,
            &pipeline,
            &framebuffers,
            &vertex_buffer,
        )?;

        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let slot = FrameSlot::create(device)?;
            defer(&mut teardown, "frame slot", device, move |d| unsafe {
                slot.destroy(d)
            });
            slots.push(slot);
        }
        info!("Sync objects created.");

        debug_assert_eq!(
            teardown.labels(),
            construction_order(VALIDATION_ENABLED, slots.len())
        );

        let sync = FrameSynchronizer::new(slots.len(), swapchain.len());

        info!("Renderer ready ({} objects to destroy on exit).", teardown.len());
        Ok(Self {
            context,
            swapchain,
            commands,
            slots,
            sync,
            teardown,
        })
    }

    /// Renders and presents one frame.
    pub fn render(&mut self) -> Result<()> {
        let mut backend = VulkanFrame {
            context: &self.context,
            swapchain: self.swapchain.handle,
            slots: &self.slots,
            command_buffers: &self.commands.buffers,
        };

        let image = self.sync.draw_frame(&mut backend)?;
        trace!("Frame {} presented image {}.", self.sync.frame(), image);
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Rendering is asynchronous: nothing can be destroyed
        // before the device has finished with it.
        if let Err(e) = unsafe { self.context.device.device_wait_idle() } {
            error!("Failed to wait for the device to be idle: {}", e);
        }

        self.teardown.unwind();
        info!("Renderer destroyed after {} frames.", self.sync.frame());
    }
}

/// The real device side of a frame iteration.
struct VulkanFrame<'a> {
    context: &'a GraphicsContext,
    swapchain: vk::SwapchainKHR,
    slots: &'a [FrameSlot],
    command_buffers: &'a [vk::CommandBuffer],
}

impl FrameBackend for VulkanFrame<'_> {
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), RenderError> {
        let fences = &[self.slots[slot].in_flight];
        unsafe { self.context.device.wait_for_fences(fences, true, u64::MAX) }
            .map(|_| ())
            .map_err(RenderError::submission)
    }

    fn acquire_image(&mut self, slot: usize) -> Result<usize, RenderError> {
        let result = unsafe {
            self.context.device.acquire_next_image_khr(
                self.swapchain,
                u64::MAX,
                self.slots[slot].image_available,
                vk::Fence::null(),
            )
        };

        // A suboptimal swapchain can still be presented to, an out
        // of date one can't.
        match result {
            Ok((index, vk::SuccessCode::SUBOPTIMAL_KHR)) => {
                trace!("Swapchain is suboptimal.");
                Ok(index as usize)
            }
            Ok((index, _)) => Ok(index as usize),
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Err(RenderError::SurfaceOutOfDate),
            Err(e) => Err(RenderError::Acquire(e)),
        }
    }

    fn submit(&mut self, slot: usize, image: usize) -> Result<(), RenderError> {
        let slot = &self.slots[slot];
        let device = &self.context.device;

        // Vertex processing can start right away, only the color
        // writes have to wait for the image to be available.
        let wait_semaphores = &[slot.image_available];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.command_buffers[image]];
        let signal_semaphores = &[slot.render_finished];
        let info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        unsafe {
            device
                .reset_fences(&[slot.in_flight])
                .map_err(RenderError::submission)?;
            device
                .queue_submit(self.context.graphics_queue, &[info], slot.in_flight)
                .map_err(RenderError::submission)
        }
    }

    fn present(&mut self, slot: usize, image: usize) -> Result<(), RenderError> {
        let wait_semaphores = &[self.slots[slot].render_finished];
        let swapchains = &[self.swapchain];
        let image_indices = &[image as u32];
        let info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        unsafe {
            self.context
                .device
                .queue_present_khr(self.context.present_queue, &info)
        }
        .map(|_| ())
        .map_err(RenderError::present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destruction_order(validation: bool, slot_count: usize) -> Vec<&'static str> {
        let mut labels = construction_order(validation, slot_count);
        labels.reverse();
        labels
    }

    #[test]
    fn destroys_in_reverse_dependency_order() {
        assert_eq!(
            destruction_order(true, 2),
            vec![
                "frame slot",
                "frame slot",
                "command pool",
                "framebuffers",
                "pipeline",
                "render pass",
                "swapchain",
                "vertex buffer",
                "logical device",
                "surface",
                "debug messenger",
                "instance",
            ]
        );
    }

    #[test]
    fn messenger_only_exists_with_validation() {
        let labels = destruction_order(false, MAX_FRAMES_IN_FLIGHT);
        assert!(!labels.contains(&"debug messenger"));
        assert_eq!(labels.iter().filter(|&&l| l == "frame slot").count(), MAX_FRAMES_IN_FLIGHT);
        assert_eq!(labels.last(), Some(&"instance"));
    }
}
