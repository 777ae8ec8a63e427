use crate::{
    core::{shaders::create_shader_module, vertex::VertexLayout},
    error::RenderError,
};

use vulkanalia::prelude::v1_0::*;
use log::*;

pub unsafe fn create_render_pass(
    device: &Device,
    format: vk::Format,
) -> Result<vk::RenderPass, RenderError> {
    // The single attachment is the swapchain image: cleared at the
    // start of the pass, stored at the end, and left ready for
    // presentation. Its previous contents don't matter, hence the
    // UNDEFINED initial layout. There is no stencil buffer.
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    // Attachment 0 is `layout(location = 0)` in the fragment shader.
    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments);

    // The layout transition at the start of the subpass must wait
    // until the image is actually available, which is signaled at
    // the COLOR_ATTACHMENT_OUTPUT stage.
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

    let attachments = &[color_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];
    let info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    let render_pass = device
        .create_render_pass(&info, None)
        .map_err(|e| RenderError::Initialization("render pass", e))?;

    info!("Render pass created.");
    Ok(render_pass)
}

fn input_assembly_state() -> vk::PipelineInputAssemblyStateCreateInfo {
    // Every three vertices form a separate triangle.
    vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
        .build()
}

fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

fn multisample_state() -> vk::PipelineMultisampleStateCreateInfo {
    vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::_1)
        .build()
}

fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    // New colors overwrite the framebuffer, on all four channels.
    vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::all())
        .blend_enable(false)
        .build()
}

fn viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport::builder()
        .x(0.0)
        .y(0.0)
        .width(extent.width as f32)
        .height(extent.height as f32)
        .min_depth(0.0)
        .max_depth(1.0)
        .build()
}

fn scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D::builder()
        .offset(vk::Offset2D::default())
        .extent(extent)
        .build()
}

/// The graphics pipeline and its (empty) layout. There is no way to
/// change it once built; a different configuration means building a
/// new one.
#[derive(Clone, Copy, Debug)]
pub struct Pipeline {
    pub layout: vk::PipelineLayout,
    pub handle: vk::Pipeline,
}

impl Pipeline {
    pub unsafe fn create(
        device: &Device,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        vertex_shader: &[u8],
        fragment_shader: &[u8],
        vertex_layout: &VertexLayout,
    ) -> Result<Self, RenderError> {
        let bindings = &[vertex_layout.binding];
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(bindings)
            .vertex_attribute_descriptions(&vertex_layout.attributes);

        let input_assembly_state = input_assembly_state();

        // Viewport and scissor are baked into the pipeline rather
        // than dynamic: the extent never changes.
        let viewports = &[viewport(extent)];
        let scissors = &[scissor(extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        let rasterization_state = rasterization_state();
        let multisample_state = multisample_state();

        let attachments = &[color_blend_attachment()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        // No descriptors nor push constants.
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = device
            .create_pipeline_layout(&layout_info, None)
            .map_err(RenderError::PipelineCreation)?;

        let vert_module = match create_shader_module(device, vertex_shader) {
            Ok(module) => module,
            Err(e) => {
                device.destroy_pipeline_layout(layout, None);
                return Err(e);
            }
        };
        let frag_module = match create_shader_module(device, fragment_shader) {
            Ok(module) => module,
            Err(e) => {
                device.destroy_shader_module(vert_module, None);
                device.destroy_pipeline_layout(layout, None);
                return Err(e);
            }
        };

        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(b"main\0");

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(b"main\0");

        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .base_pipeline_handle(vk::Pipeline::null())
            .base_pipeline_index(-1);

        let result = device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], None);

        // The pipeline keeps no reference to the modules.
        device.destroy_shader_module(vert_module, None);
        device.destroy_shader_module(frag_module, None);

        let handle = match result {
            Ok((pipelines, _)) => pipelines[0],
            Err(e) => {
                device.destroy_pipeline_layout(layout, None);
                return Err(RenderError::PipelineCreation(e));
            }
        };

        info!("Pipeline created.");
        Ok(Self { layout, handle })
    }

    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_pipeline(self.handle, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_filled_triangle_lists_culling_back_faces() {
        assert_eq!(input_assembly_state().topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(input_assembly_state().primitive_restart_enable, vk::FALSE);

        let rasterization = rasterization_state();
        assert_eq!(rasterization.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(rasterization.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(rasterization.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(rasterization.depth_bias_enable, vk::FALSE);
    }

    #[test]
    fn single_sample_without_blending() {
        assert_eq!(multisample_state().rasterization_samples, vk::SampleCountFlags::_1);

        let blend = color_blend_attachment();
        assert_eq!(blend.blend_enable, vk::FALSE);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::all());
    }

    #[test]
    fn viewport_and_scissor_cover_the_extent() {
        let extent = vk::Extent2D { width: 1024, height: 768 };

        let viewport = viewport(extent);
        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (1024.0, 768.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

        let scissor = scissor(extent);
        assert_eq!(scissor.offset, vk::Offset2D::default());
        assert_eq!(scissor.extent, extent);
    }
}
