use crate::error::RenderError;

use vulkanalia::prelude::v1_0::*;

pub fn subresource_range(aspects: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    // One mip level and one array layer: swapchain images are plain
    // 2D color targets, there is no stereoscopic rendering here.
    vk::ImageSubresourceRange::builder()
        .aspect_mask(aspects)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
        .build()
}

pub unsafe fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspects: vk::ImageAspectFlags,
) -> Result<vk::ImageView, RenderError> {
    // Images are not accessed directly but through image views,
    // which describe how to read the image and which part of it.
    // We don't want to swizzle the color components, so the
    // mapping is the identity.
    let components = vk::ComponentMapping::builder()
        .r(vk::ComponentSwizzle::IDENTITY)
        .g(vk::ComponentSwizzle::IDENTITY)
        .b(vk::ComponentSwizzle::IDENTITY)
        .a(vk::ComponentSwizzle::IDENTITY)
        .build();

    let info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::_2D)
        .format(format)
        .components(components)
        .subresource_range(subresource_range(aspects));

    device
        .create_image_view(&info, None)
        .map_err(|e| RenderError::Initialization("image view", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_range_covers_a_single_level_and_layer() {
        let range = subresource_range(vk::ImageAspectFlags::COLOR);

        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!((range.base_mip_level, range.level_count), (0, 1));
        assert_eq!((range.base_array_layer, range.layer_count), (0, 1));
    }
}
