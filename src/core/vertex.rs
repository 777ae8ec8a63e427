use std::mem::size_of;

use glam::Vec3;
use lazy_static::lazy_static;
use vulkanalia::prelude::v1_0::*;

lazy_static! {
    pub static ref VERTICES: Vec<Vertex> = vec![
        Vertex::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(1.0, 0.0, 0.0)),
        Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec3::new(0.0, 1.0, 0.0)),
        Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    ];
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub pos: Vec3,
    pub color: Vec3,
}

/// How vertex records are laid out in the vertex buffer: a single
/// binding and one attribute per vertex field.
#[derive(Clone, Debug)]
pub struct VertexLayout {
    pub binding: vk::VertexInputBindingDescription,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl Vertex {
    pub const fn new(pos: Vec3, color: Vec3) -> Self {
        Self { pos, color }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        // Binding 0, advancing by one whole vertex record per
        // vertex (not per instance).
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        // The location is the `layout(location = x)` of the vertex
        // shader input; both fields are three 32-bit floats.
        let pos = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(0)
            .build();

        let color = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(size_of::<Vec3>() as u32)
            .build();

        [pos, color]
    }

    pub fn layout() -> VertexLayout {
        VertexLayout {
            binding: Self::binding_description(),
            attributes: Self::attribute_descriptions().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_the_record() {
        let layout = Vertex::layout();

        assert_eq!(size_of::<Vertex>(), 24);
        assert_eq!(layout.binding.stride, 24);
        assert_eq!(layout.binding.input_rate, vk::VertexInputRate::VERTEX);

        let locations = layout.attributes.iter().map(|a| (a.location, a.offset)).collect::<Vec<_>>();
        assert_eq!(locations, vec![(0, 0), (1, 12)]);
        assert!(layout
            .attributes
            .iter()
            .all(|a| a.binding == 0 && a.format == vk::Format::R32G32B32_SFLOAT));
    }

    #[test]
    fn triangle_has_three_vertices() {
        assert_eq!(VERTICES.len(), 3);
        assert_eq!(VERTICES[0].color, Vec3::X);
    }
}
