use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Data unique to each frame passed into a uniform buffer
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub mvp: Mat4,
}

/// Data unique to each vertex passed as elements into a vertex buffer
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PerVertexData {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
}

/// Data unique to each draw call passed as a push constant.
/// `diffuse.w` carries albedo and `specular.w` carries roughness.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PerDrawData {
    pub diffuse: Vec4,
    pub specular: Vec4,
}
