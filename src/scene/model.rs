use crate::renderer::resources::mesh::Mesh;
use crate::scene::material::Material;

/// One drawable entry of a scene: a mesh paired with the material it is shaded with
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: String,
    mesh: Mesh,
    material: Material,
}

impl Model {
    pub fn new(name: impl Into<String>, mesh: Mesh, material: Material) -> Self {
        Self {
            name: name.into(),
            mesh,
            material,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn get_material(&self) -> &Material {
        &self.material
    }

    pub fn get_material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    pub fn set_mesh(&mut self, mesh: Mesh) {
        self.mesh = mesh;
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_replace_only_their_part() {
        let mut model = Model::new("box", Mesh::new_cube(), Material::new());

        let mut material = Material::new();
        material.set_albedo(0.4);
        model.set_material(material.clone());
        assert_eq!(model.get_material(), &material);
        assert_eq!(model.get_mesh(), &Mesh::new_cube());

        model.set_mesh(Mesh::new_triangle());
        assert_eq!(model.get_mesh(), &Mesh::new_triangle());
        assert_eq!(model.get_material(), &material);
        assert_eq!(model.get_name(), "box");
    }
}
