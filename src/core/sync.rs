use crate::error::RenderError;

use vulkanalia::prelude::v1_0::*;

/// Synchronization objects for one frame in flight.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlot {
    /// Signaled when the acquired image is ready to be rendered to.
    pub image_available: vk::Semaphore,
    /// Signaled when rendering is done and the image can be
    /// presented.
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's last submission completed.
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    pub unsafe fn create(device: &Device) -> Result<Self, RenderError> {
        // Semaphores order work on the GPU, while fences let the
        // host wait for it. Fences start unsignaled by default,
        // which would block the very first wait forever.
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let map = |e| RenderError::ResourceAllocation("frame synchronization", e);

        let image_available = device.create_semaphore(&semaphore_info, None).map_err(map)?;
        let render_finished = match device.create_semaphore(&semaphore_info, None) {
            Ok(semaphore) => semaphore,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                return Err(map(e));
            }
        };
        let in_flight = match device.create_fence(&fence_info, None) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_semaphore(render_finished, None);
                device.destroy_semaphore(image_available, None);
                return Err(map(e));
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_fence(self.in_flight, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_semaphore(self.image_available, None);
    }
}
