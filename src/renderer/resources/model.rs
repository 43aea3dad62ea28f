use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::resources::image::Image;
use crate::renderer::resources::mesh::GpuMesh;
use crate::renderer::shader_data::PerDrawData;
use crate::scene::model::Model;

/// A scene model whose geometry lives on the GPU
pub struct GpuModel {
    pub mesh: GpuMesh,
    pub material: PerDrawData,
    // TODO: bind through a combined image sampler once models get their own descriptor sets
    #[allow(dead_code)]
    pub diffuse_texture: Option<Image>,
}

impl GpuModel {
    pub fn upload(model: &Model, dev: &RenderDevice) -> Result<Self> {
        let mesh = GpuMesh::upload(model.get_mesh(), dev)
            .wrap_err_with(|| format!("Failed to upload mesh of model '{}'", model.get_name()))?;

        let material = model.get_material();
        let diffuse_texture = match material.diffuse_texture_path() {
            Some(_) => Some(material.diffuse_texture(dev)?),
            None => None,
        };

        Ok(Self {
            mesh,
            material: material.data().as_shader_data(),
            diffuse_texture,
        })
    }
}
