use ash::vk;
use color_eyre::Result;
use glam::{Vec2, Vec3};
use crate::renderer::core::device::RenderDevice;
use crate::renderer::resources::buffer::Buffer;
use crate::renderer::resources::vertex::Vertex;
use crate::renderer::shader_data::PerVertexData;

/// CPU-side geometry. Triangles are wound counter-clockwise when seen from the front.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Option<Vec<u32>>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Option<Vec<u32>>) -> Self {
        Self {
            vertices,
            indices,
        }
    }

    pub fn new_triangle() -> Self {
        let vertices = vec![
            Vertex { // Bottom left
                position: [-0.5, -0.5, 0.0].into(),
                normal: Vec3::Z,
                texcoord: [0.0, 1.0].into(),
            },
            Vertex { // Bottom right
                position: [0.5, -0.5, 0.0].into(),
                normal: Vec3::Z,
                texcoord: [1.0, 1.0].into(),
            },
            Vertex { // Top
                position: [0.0, 0.5, 0.0].into(),
                normal: Vec3::Z,
                texcoord: [0.5, 0.0].into(),
            },
        ];

        let indices = vec![0, 1, 2];

        Self::new(vertices, Some(indices))
    }

    pub fn new_quad() -> Self {
        let vertices = vec![
            Vertex { // Top left
                position: [-1.0, 1.0, 0.0].into(),
                normal: Vec3::Z,
                texcoord: [0.0, 0.0].into(),
            },
            Vertex { // Bottom left
                position: [-1.0, -1.0, 0.0].into(),
                normal: Vec3::Z,
                texcoord: [0.0, 1.0].into(),
            },
            Vertex { // Top right
                position: [1.0, 1.0, 0.0].into(),
                normal: Vec3::Z,
                texcoord: [1.0, 0.0].into(),
            },
            Vertex { // Bottom right
                position: [1.0, -1.0, 0.0].into(),
                normal: Vec3::Z,
                texcoord: [1.0, 1.0].into(),
            },
        ];

        let indices = vec![
            0, 1, 2, // Top left triangle
            2, 1, 3, // Bottom right triangle
        ];

        Self::new(vertices, Some(indices))
    }

    /// Unit cube centered on the origin with flat per-face normals
    pub fn new_cube() -> Self {
        // (normal, u, v) with u x v == normal
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];
        let corners = [
            (-1.0, -1.0, Vec2::new(0.0, 1.0)),
            (1.0, -1.0, Vec2::new(1.0, 1.0)),
            (1.0, 1.0, Vec2::new(1.0, 0.0)),
            (-1.0, 1.0, Vec2::new(0.0, 0.0)),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv, texcoord) in corners {
                vertices.push(Vertex {
                    position: (normal + u * su + v * sv) * 0.5,
                    normal,
                    texcoord,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::new(vertices, Some(indices))
    }

    pub fn shader_vertices(&self) -> Vec<PerVertexData> {
        self.vertices
            .iter()
            .map(Vertex::as_shader_data)
            .collect()
    }
}

/// Geometry uploaded into device-local vertex and index buffers
pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl GpuMesh {
    pub fn upload(mesh: &Mesh, dev: &RenderDevice) -> Result<Self> {
        let vertex_buffer = dev.create_buffer_with_data(
            &mesh.shader_vertices(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "Vertex buffer",
        )?;

        let index_buffer = match mesh.indices.as_ref() {
            Some(indices) if !indices.is_empty() => Some(dev.create_buffer_with_data(
                indices,
                vk::BufferUsageFlags::INDEX_BUFFER,
                "Index buffer",
            )?),
            _ => None,
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: mesh.vertices.len() as u32,
            index_count: mesh.indices.as_ref().map_or(0, |indices| indices.len() as u32),
        })
    }

    /// Binds the buffers and issues the draw call
    pub fn draw(&self, cmd: vk::CommandBuffer, device: &ash::Device) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            match self.index_buffer.as_ref() {
                Some(index_buffer) => {
                    device.cmd_bind_index_buffer(cmd, index_buffer.buffer, 0, vk::IndexType::UINT32);
                    device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
                }
                None => device.cmd_draw(cmd, self.vertex_count, 1, 0, 0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangles(mesh: &Mesh) -> Vec<[Vec3; 3]> {
        mesh.indices
            .as_ref()
            .unwrap()
            .chunks(3)
            .map(|t| {
                [
                    mesh.vertices[t[0] as usize].position,
                    mesh.vertices[t[1] as usize].position,
                    mesh.vertices[t[2] as usize].position,
                ]
            })
            .collect()
    }

    #[test]
    fn primitives_face_their_normals() {
        for mesh in [Mesh::new_triangle(), Mesh::new_quad(), Mesh::new_cube()] {
            let indices = mesh.indices.as_ref().unwrap();
            for (tri, chunk) in triangles(&mesh).iter().zip(indices.chunks(3)) {
                let face_normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
                let vertex_normal = mesh.vertices[chunk[0] as usize].normal;
                assert!(face_normal.dot(vertex_normal) > 0.0, "clockwise triangle {:?}", tri);
            }
        }
    }

    #[test]
    fn cube_has_flat_faces_on_its_hull() {
        let cube = Mesh::new_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.as_ref().unwrap().len(), 36);

        for vertex in cube.vertices.iter() {
            assert_eq!(vertex.position.abs().max_element(), 0.5);
            assert_eq!(vertex.position.dot(vertex.normal), 0.5);
        }
    }

    #[test]
    fn shader_vertices_keep_order() {
        let quad = Mesh::new_quad();
        let data = quad.shader_vertices();
        assert_eq!(data.len(), 4);
        assert_eq!(data[3].position, quad.vertices[3].position);
        assert_eq!(data[3].texcoord, Vec2::new(1.0, 1.0));
    }
}
