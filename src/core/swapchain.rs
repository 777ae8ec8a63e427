use crate::{
    core::{context::GraphicsContext, image::create_image_view, queues::QueueFamilies},
    error::RenderError,
};

use vulkanalia::{
    prelude::v1_0::*,
    vk::KhrSurfaceExtension,
    vk::KhrSwapchainExtension,
};

use log::*;

/// What a surface supports on a given physical device. Queried
/// again whenever the device or surface changes, never cached.
#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn query(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Self> {
        // There is no "default framebuffer" in Vulkan: images are
        // rendered into a queue owned by a swapchain before they
        // are shown on screen. Not every device can present (think
        // of server cards without display outputs), so whether and
        // how a device can present to our surface has to be asked
        // first.
        Ok(Self {
            capabilities: instance
                .get_physical_device_surface_capabilities_khr(physical_device, surface)?,
            formats: instance
                .get_physical_device_surface_formats_khr(physical_device, surface)?,
            present_modes: instance
                .get_physical_device_surface_present_modes_khr(physical_device, surface)?,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Picks an 8-bit BGRA format in the sRGB non-linear color space,
/// wherever it sits in the list, and otherwise settles for the first
/// supported format.
///
/// `formats` must not be empty; devices without any surface format
/// are rejected while probing.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .cloned()
        .unwrap_or_default()
}

pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    // MAILBOX replaces queued images instead of blocking when the
    // queue is full ("triple buffering"): low latency without
    // tearing. FIFO is the only mode every implementation has to
    // support, so it is the fallback.
    present_modes
        .iter()
        .cloned()
        .find(|&m| m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The resolution of the swapchain images.
///
/// Most window managers fix the extent to the window size and report
/// it as the current extent; the ones that let us choose report a
/// width of `u32::MAX` instead, in which case the desired size is
/// clamped into the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D::builder()
            .width(desired.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ))
            .height(desired.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ))
            .build()
    }
}

/// One more image than the minimum, so that we never have to wait
/// on the driver before acquiring, bounded by the maximum when
/// there is one (0 means no maximum).
pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Everything the swapchain create call is given, worked out from
/// the surface support and the queue families.
#[derive(Clone, Debug)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    pub fn negotiate(
        support: &SwapchainSupport,
        families: &QueueFamilies,
        desired: vk::Extent2D,
    ) -> Self {
        let (sharing_mode, queue_family_indices) = families.sharing_mode();
        Self {
            surface_format: choose_surface_format(&support.formats),
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, desired),
            image_count: image_count(&support.capabilities),
            sharing_mode,
            queue_family_indices,
            pre_transform: support.capabilities.current_transform,
        }
    }
}

/// The presentable images, with one view each. Built and destroyed
/// as a whole.
#[derive(Clone, Debug)]
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

impl Swapchain {
    pub unsafe fn create(
        context: &GraphicsContext,
        desired: vk::Extent2D,
    ) -> Result<Self, RenderError> {
        let support = SwapchainSupport::query(
            &context.instance,
            context.surface,
            context.physical_device,
        )
        .map_err(|e| RenderError::Initialization("surface support query", e))?;
        let config = SwapchainConfig::negotiate(&support, &context.queue_families, desired);
        debug!("Swapchain configuration: {:?}", config);

        // Apart from the negotiated values:
        //  - one array layer, as we don't render stereoscopically;
        //  - the images are rendered to directly, so they are
        //    COLOR_ATTACHMENT images;
        //  - the surface's current transform is kept;
        //  - the alpha channel is not blended with other windows;
        //  - pixels hidden by other windows may be discarded;
        //  - there is no previous swapchain, since the swapchain is
        //    never recreated.
        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(config.sharing_mode)
            .queue_family_indices(&config.queue_family_indices)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let device = &context.device;
        let handle = device
            .create_swapchain_khr(&info, None)
            .map_err(RenderError::ChainCreation)?;

        // The implementation may create more images than requested.
        let images = match device.get_swapchain_images_khr(handle) {
            Ok(images) => images,
            Err(e) => {
                device.destroy_swapchain_khr(handle, None);
                return Err(RenderError::ChainCreation(e));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            match create_image_view(
                device,
                image,
                config.surface_format.format,
                vk::ImageAspectFlags::COLOR,
            ) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    image_views
                        .iter()
                        .for_each(|&v| device.destroy_image_view(v, None));
                    device.destroy_swapchain_khr(handle, None);
                    return Err(e);
                }
            }
        }

        info!(
            "Swapchain created ({} images, {}x{}, {:?}).",
            images.len(),
            config.extent.width,
            config.extent.height,
            config.present_mode
        );

        Ok(Self {
            handle,
            format: config.surface_format.format,
            extent: config.extent,
            images,
            image_views,
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub unsafe fn destroy(&self, device: &Device) {
        // Views reference the images owned by the swapchain, so
        // they go first.
        self.image_views
            .iter()
            .for_each(|&v| device.destroy_image_view(v, None));
        device.destroy_swapchain_khr(self.handle, None);
    }
}

/// One framebuffer per swapchain image view, bound to the render
/// pass and sized to the swapchain extent.
#[derive(Clone, Debug)]
pub struct Framebuffers {
    pub handles: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    pub unsafe fn create(
        device: &Device,
        swapchain: &Swapchain,
        render_pass: vk::RenderPass,
    ) -> Result<Self, RenderError> {
        let mut handles = Vec::with_capacity(swapchain.image_views.len());

        for &view in &swapchain.image_views {
            let attachments = &[view];
            let info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(attachments)
                .width(swapchain.extent.width)
                .height(swapchain.extent.height)
                .layers(1);

            match device.create_framebuffer(&info, None) {
                Ok(framebuffer) => handles.push(framebuffer),
                Err(e) => {
                    Self { handles }.destroy(device);
                    return Err(RenderError::Initialization("framebuffer", e));
                }
            }
        }

        info!("Framebuffers created.");
        Ok(Self { handles })
    }

    pub unsafe fn destroy(&self, device: &Device) {
        self.handles
            .iter()
            .for_each(|&f| device.destroy_framebuffer(f, None));
    }
}
