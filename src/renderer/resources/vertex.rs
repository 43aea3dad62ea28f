use std::mem::{offset_of, size_of};
use ash::vk;
use glam::{Vec2, Vec3};
use crate::renderer::shader_data::PerVertexData;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
}

impl Vertex {
    pub fn as_shader_data(&self) -> PerVertexData {
        PerVertexData {
            position: self.position,
            normal: self.normal,
            texcoord: self.texcoord,
        }
    }

    /// Matches the `location` qualifiers in `shaders/mesh.vert`
    pub fn input_description() -> VertexInputDescription {
        let bindings = vec![
            vk::VertexInputBindingDescription {
                binding: 0,
                stride: size_of::<PerVertexData>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            },
        ];
        let attributes = vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(PerVertexData, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(PerVertexData, normal) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(PerVertexData, texcoord) as u32,
            },
        ];

        VertexInputDescription {
            bindings,
            attributes,
            flags: vk::PipelineVertexInputStateCreateFlags::empty(),
        }
    }
}

pub struct VertexInputDescription {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
    pub flags: vk::PipelineVertexInputStateCreateFlags,
}
