//! CPU-side scene description.
//!
//! Loading a scene never touches the GPU; the renderer uploads the geometry in a
//! separate step once a device exists.

pub mod error;
pub mod material;
pub mod model;

use std::fs;
use std::path::Path;
use serde::Deserialize;
use serde_json::Value;
use crate::renderer::resources::mesh::Mesh;
use crate::renderer::resources::vertex::Vertex;
use crate::scene::error::SceneError;
use crate::scene::material::Material;
use crate::scene::model::Model;

/// Geometry of a model, either a built-in primitive or inline vertex data
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MeshNode {
    Primitive(String),
    Inline(InlineMesh),
}

#[derive(Debug, Deserialize)]
struct InlineMesh {
    positions: Vec<[f32; 3]>,
    #[serde(default)]
    normals: Vec<[f32; 3]>,
    #[serde(default)]
    texcoords: Vec<[f32; 2]>,
    indices: Option<Vec<u32>>,
}

#[derive(Debug, Default)]
pub struct Scene {
    models: Vec<Model>,
}

impl Scene {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scene = Self::from_json_str(&text)?;
        log::info!("Loaded scene {:?} with {} models", path, scene.models.len());
        Ok(scene)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SceneError> {
        let root: Value = serde_json::from_str(text)?;
        Self::from_value(&root)
    }

    pub fn from_value(root: &Value) -> Result<Self, SceneError> {
        let nodes = root
            .get("models")
            .ok_or_else(|| SceneError::MissingNode("models".to_string()))?
            .as_array()
            .ok_or_else(|| SceneError::format("models", "expected an array"))?;

        let models = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| read_model(i, node))
            .collect::<Result<Vec<Model>, SceneError>>()?;

        Ok(Self { models })
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn read_model(index: usize, node: &Value) -> Result<Model, SceneError> {
    let key = format!("models[{index}]");

    let name = match node.get("name") {
        None => key.clone(),
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(SceneError::format(
                format!("{key}.name"),
                format!("expected a string, found {other}"),
            ));
        }
    };

    let mesh_node = node
        .get("mesh")
        .ok_or_else(|| SceneError::MissingNode(format!("{key}.mesh")))?;
    let mesh_node = MeshNode::deserialize(mesh_node)
        .map_err(|e| SceneError::format(format!("{key}.mesh"), e.to_string()))?;
    let mesh = build_mesh(&format!("{key}.mesh"), mesh_node)?;

    let material = match node.get("material") {
        Some(material_node) => Material::from_node(material_node)?,
        None => Material::new(),
    };

    Ok(Model::new(name, mesh, material))
}

fn build_mesh(key: &str, node: MeshNode) -> Result<Mesh, SceneError> {
    match node {
        MeshNode::Primitive(name) => match name.as_str() {
            "triangle" => Ok(Mesh::new_triangle()),
            "quad" => Ok(Mesh::new_quad()),
            "cube" => Ok(Mesh::new_cube()),
            _ => Err(SceneError::format(key, format!("unknown primitive '{name}'"))),
        },
        MeshNode::Inline(inline) => {
            let count = inline.positions.len();
            if count == 0 {
                return Err(SceneError::format(key, "mesh has no positions"));
            }
            if !inline.normals.is_empty() && inline.normals.len() != count {
                return Err(SceneError::format(
                    key,
                    format!("expected {count} normals, found {}", inline.normals.len()),
                ));
            }
            if !inline.texcoords.is_empty() && inline.texcoords.len() != count {
                return Err(SceneError::format(
                    key,
                    format!("expected {count} texcoords, found {}", inline.texcoords.len()),
                ));
            }
            if let Some(indices) = inline.indices.as_ref() {
                if let Some(bad) = indices.iter().find(|&&i| i as usize >= count) {
                    return Err(SceneError::format(
                        key,
                        format!("index {bad} out of range for {count} vertices"),
                    ));
                }
            }

            let vertices = (0..count)
                .map(|i| Vertex {
                    position: inline.positions[i].into(),
                    normal: inline.normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]).into(),
                    texcoord: inline.texcoords.get(i).copied().unwrap_or([0.0, 0.0]).into(),
                })
                .collect::<Vec<Vertex>>();

            Ok(Mesh::new(vertices, inline.indices))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const TWO_MODELS: &str = r#"{
        "models": [
            {
                "name": "floor",
                "mesh": "quad",
                "material": { "albedo": 0.4, "diffuseColor": [0.2, 0.3, 0.4] }
            },
            {
                "name": "crate",
                "mesh": "cube",
                "material": { "roughness": 0.8, "diffuseTexture": "crate.png" }
            }
        ]
    }"#;

    #[test]
    fn loads_models_in_document_order() {
        let scene = Scene::from_json_str(TWO_MODELS).unwrap();
        assert_eq!(scene.len(), 2);

        let names = scene.models().iter().map(|m| m.get_name()).collect::<Vec<_>>();
        assert_eq!(names, ["floor", "crate"]);

        assert_eq!(scene.models()[0].get_material().data().albedo, 0.4);
        assert_eq!(scene.models()[1].get_material().data().roughness, 0.8);
        assert_eq!(scene.models()[1].get_mesh(), &Mesh::new_cube());
    }

    #[test]
    fn models_do_not_share_materials() {
        let json = r#"{
            "models": [
                { "mesh": "triangle", "material": { "albedo": 0.5 } },
                { "mesh": "triangle", "material": { "albedo": 0.5 } }
            ]
        }"#;
        let mut scene = Scene::from_json_str(json).unwrap();
        assert_eq!(scene.models()[0].get_material(), scene.models()[1].get_material());

        scene.models_mut()[0]
            .get_material_mut()
            .set_diffuse_color(Vec3::new(1.0, 0.0, 0.0));

        assert_eq!(scene.models()[1].get_material().data().diffuse_color, Vec3::ONE);
        assert_ne!(scene.models()[0].get_material(), scene.models()[1].get_material());
    }

    #[test]
    fn unnamed_models_get_positional_names_and_default_materials() {
        let scene = Scene::from_json_str(r#"{ "models": [ { "mesh": "triangle" } ] }"#).unwrap();
        let model = &scene.models()[0];
        assert_eq!(model.get_name(), "models[0]");
        assert_eq!(model.get_material(), &Material::new());
    }

    #[test]
    fn inline_mesh_fills_missing_attributes() {
        let json = r#"{
            "models": [ {
                "mesh": {
                    "positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
                    "indices": [0, 1, 2]
                }
            } ]
        }"#;
        let scene = Scene::from_json_str(json).unwrap();
        let mesh = scene.models()[0].get_mesh();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[1].position, Vec3::X);
        assert_eq!(mesh.vertices[2].normal, Vec3::Z);
        assert_eq!(mesh.indices.as_deref(), Some(&[0, 1, 2][..]));
    }

    #[test]
    fn inline_mesh_rejects_bad_indices() {
        let json = r#"{ "models": [ { "mesh": {
            "positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
            "indices": [0, 1, 3]
        } } ] }"#;
        let err = Scene::from_json_str(json).unwrap_err();
        assert!(matches!(err, SceneError::ConfigFormat { ref key, .. } if key == "models[0].mesh"));
    }

    #[test]
    fn malformed_material_aborts_the_load() {
        let json = r#"{ "models": [
            { "mesh": "quad" },
            { "mesh": "quad", "material": { "diffuseColor": [1, 1, 1, 1] } }
        ] }"#;
        let err = Scene::from_json_str(json).unwrap_err();
        assert!(matches!(err, SceneError::ConfigFormat { ref key, .. } if key == "diffuseColor"));
    }

    #[test]
    fn unknown_primitive_and_missing_models_are_errors() {
        assert!(matches!(
            Scene::from_json_str(r#"{ "models": [ { "mesh": "teapot" } ] }"#),
            Err(SceneError::ConfigFormat { .. })
        ));
        assert!(matches!(
            Scene::from_json_str(r#"{ "objects": [] }"#),
            Err(SceneError::MissingNode(_))
        ));
        assert!(matches!(
            Scene::from_json_str("{ not json"),
            Err(SceneError::Json(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("meshview-scene-{}.json", std::process::id()));
        fs::write(&path, TWO_MODELS).unwrap();

        let scene = Scene::load(&path);
        fs::remove_file(&path).unwrap();

        assert_eq!(scene.unwrap().len(), 2);
    }

    #[test]
    fn bundled_demo_scene_loads() {
        let scene = Scene::load(concat!(env!("CARGO_MANIFEST_DIR"), "/scenes/demo.json")).unwrap();
        let names = scene.models().iter().map(Model::get_name).collect::<Vec<_>>();
        assert_eq!(names, ["cube", "floor"]);
        assert_eq!(scene.models()[1].get_mesh().indices.as_deref(), Some(&[0, 1, 2, 2, 3, 0][..]));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Scene::load("/definitely/not/here/scene.json").unwrap_err();
        assert!(matches!(err, SceneError::Io { .. }));
    }
}
