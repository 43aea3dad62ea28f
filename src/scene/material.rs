use std::path::{Path, PathBuf};
use color_eyre::Result;
use glam::Vec3;
use serde_json::{json, Map, Value};
use crate::renderer::shader_data::PerDrawData;
use crate::scene::error::SceneError;

/// Turns a texture reference into something the renderer can bind
pub trait TextureLoader {
    type Texture;

    fn load_texture(&self, path: &Path) -> Result<Self::Texture>;
}

/// Numeric shading parameters of a material
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialData {
    pub albedo: f32,
    pub roughness: f32,
    pub diffuse_color: Vec3,
    pub specular_color: Vec3,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            albedo: 1.0,
            roughness: 0.0,
            diffuse_color: Vec3::ONE,
            specular_color: Vec3::ONE,
        }
    }
}

impl MaterialData {
    pub fn as_shader_data(&self) -> PerDrawData {
        PerDrawData {
            diffuse: self.diffuse_color.extend(self.albedo),
            specular: self.specular_color.extend(self.roughness),
        }
    }
}

/// Shading parameters plus an optional diffuse texture reference.
///
/// Equality is field-wise and exact: two materials whose colors differ only by
/// rounding noise are not equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    data: MaterialData,
    diffuse_texture: Option<PathBuf>,
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_node(node: &Value) -> Result<Self, SceneError> {
        let mut material = Self::new();
        material.read_node(node)?;
        Ok(material)
    }

    /// Reads the child `key` of `source` into this material
    pub fn read(&mut self, source: &Value, key: &str) -> Result<(), SceneError> {
        let node = source
            .get(key)
            .ok_or_else(|| SceneError::MissingNode(key.to_string()))?;
        self.read_node(node)
    }

    /// Reads a material node. On failure the material is left untouched.
    pub fn read_node(&mut self, node: &Value) -> Result<(), SceneError> {
        let object = node
            .as_object()
            .ok_or_else(|| SceneError::format("material", "expected an object"))?;

        let data = MaterialData {
            albedo: read_scalar(object, "albedo", 1.0)?,
            roughness: read_scalar(object, "roughness", 0.0)?,
            diffuse_color: read_color(object, "diffuseColor")?,
            specular_color: read_color(object, "specularColor")?,
        };

        let diffuse_texture = match object.get("diffuseTexture") {
            None | Some(Value::Null) => None,
            Some(Value::String(path)) if path.is_empty() => None,
            Some(Value::String(path)) => Some(PathBuf::from(path)),
            Some(other) => {
                return Err(SceneError::format(
                    "diffuseTexture",
                    format!("expected a string, found {other}"),
                ));
            }
        };

        self.data = data;
        self.diffuse_texture = diffuse_texture;
        Ok(())
    }

    /// Writes this material as the child `key` of `sink`
    pub fn save(&self, sink: &mut Map<String, Value>, key: &str) {
        sink.insert(key.to_string(), self.save_node());
    }

    pub fn save_node(&self) -> Value {
        let diffuse_texture = self.diffuse_texture
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();

        json!({
            "albedo": float_node(self.data.albedo),
            "roughness": float_node(self.data.roughness),
            "diffuseColor": color_node(self.data.diffuse_color),
            "specularColor": color_node(self.data.specular_color),
            "diffuseTexture": diffuse_texture,
        })
    }

    /// Loads the referenced diffuse texture
    pub fn diffuse_texture<L: TextureLoader>(&self, loader: &L) -> Result<L::Texture> {
        let path = self.diffuse_texture
            .as_ref()
            .ok_or_else(|| SceneError::ResourceState(
                "Material has no diffuse texture reference".to_string()
            ))?;
        loader.load_texture(path)
    }

    pub fn data(&self) -> MaterialData {
        self.data
    }

    pub fn diffuse_texture_path(&self) -> Option<&Path> {
        self.diffuse_texture.as_deref()
    }

    pub fn set_albedo(&mut self, albedo: f32) {
        self.data.albedo = albedo;
    }

    pub fn set_roughness(&mut self, roughness: f32) {
        self.data.roughness = roughness;
    }

    pub fn set_diffuse_color(&mut self, color: Vec3) {
        self.data.diffuse_color = color;
    }

    pub fn set_specular_color(&mut self, color: Vec3) {
        self.data.specular_color = color;
    }

    pub fn set_diffuse_texture(&mut self, path: impl Into<PathBuf>) {
        self.diffuse_texture = Some(path.into());
    }
}

/// JSON has no literal for infinities and NaN, so those are written as strings
fn float_node(value: f32) -> Value {
    if value.is_nan() {
        Value::from("nan")
    } else if value.is_infinite() {
        Value::from(if value > 0.0 { "inf" } else { "-inf" })
    } else {
        Value::from(value)
    }
}

fn color_node(color: Vec3) -> Value {
    Value::Array(color.to_array().into_iter().map(float_node).collect())
}

fn parse_float(value: &Value) -> Option<f32> {
    match value {
        Value::String(text) => match text.as_str() {
            "nan" => Some(f32::NAN),
            "inf" => Some(f32::INFINITY),
            "-inf" => Some(f32::NEG_INFINITY),
            _ => None,
        },
        other => other.as_f64().map(|v| v as f32),
    }
}

fn read_scalar(object: &Map<String, Value>, key: &str, default: f32) -> Result<f32, SceneError> {
    match object.get(key) {
        None => Ok(default),
        Some(value) => parse_float(value)
            .ok_or_else(|| SceneError::format(key, format!("expected a number, found {value}"))),
    }
}

fn read_color(object: &Map<String, Value>, key: &str) -> Result<Vec3, SceneError> {
    let Some(value) = object.get(key) else {
        return Ok(Vec3::ONE);
    };

    let elements = value
        .as_array()
        .ok_or_else(|| SceneError::format(key, "expected an array of 3 numbers"))?;
    if elements.len() != 3 {
        return Err(SceneError::format(
            key,
            format!("expected 3 elements, found {}", elements.len()),
        ));
    }

    let mut color = [0.0; 3];
    for (component, element) in color.iter_mut().zip(elements) {
        *component = parse_float(element)
            .ok_or_else(|| SceneError::format(key, format!("expected a number, found {element}")))?;
    }

    Ok(Vec3::from_array(color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingLoader {
        requested: RefCell<Vec<PathBuf>>,
    }

    impl TextureLoader for RecordingLoader {
        type Texture = String;

        fn load_texture(&self, path: &Path) -> Result<String> {
            self.requested.borrow_mut().push(path.to_path_buf());
            Ok(format!("texture:{}", path.display()))
        }
    }

    fn sample_material() -> Material {
        let mut material = Material::new();
        material.set_albedo(0.75);
        material.set_roughness(0.3);
        material.set_diffuse_color(Vec3::new(0.1, 0.2, 0.3));
        material.set_specular_color(Vec3::new(0.9, 0.8, 0.7));
        material.set_diffuse_texture("textures/brick.png");
        material
    }

    #[test]
    fn missing_fields_take_defaults() {
        let material = Material::from_node(&json!({})).unwrap();
        let data = material.data();
        assert_eq!(data.albedo, 1.0);
        assert_eq!(data.roughness, 0.0);
        assert_eq!(data.diffuse_color, Vec3::ONE);
        assert_eq!(data.specular_color, Vec3::ONE);
        assert!(material.diffuse_texture_path().is_none());
    }

    #[test]
    fn reads_named_child() {
        let root = json!({
            "material": {
                "albedo": 0.5,
                "roughness": 0.25,
                "diffuseColor": [1.0, 0.0, 0.5],
                "diffuseTexture": "a.png"
            }
        });
        let mut material = Material::new();
        material.read(&root, "material").unwrap();

        let data = material.data();
        assert_eq!(data.albedo, 0.5);
        assert_eq!(data.roughness, 0.25);
        assert_eq!(data.diffuse_color, Vec3::new(1.0, 0.0, 0.5));
        assert_eq!(data.specular_color, Vec3::ONE);
        assert_eq!(material.diffuse_texture_path(), Some(Path::new("a.png")));
    }

    #[test]
    fn missing_child_is_reported() {
        let mut material = Material::new();
        let err = material.read(&json!({}), "material").unwrap_err();
        assert!(matches!(err, SceneError::MissingNode(key) if key == "material"));
    }

    #[test]
    fn save_then_read_reproduces_every_field() {
        let material = sample_material();
        let mut root = Map::new();
        material.save(&mut root, "material");

        let mut restored = Material::new();
        restored.read(&Value::Object(root), "material").unwrap();
        assert_eq!(restored, material);
        assert_eq!(restored.data().albedo.to_bits(), 0.75f32.to_bits());
    }

    #[test]
    fn defaults_survive_a_round_trip() {
        let material = Material::from_node(&json!({ "albedo": 0.1 })).unwrap();
        let restored = Material::from_node(&material.save_node()).unwrap();
        assert_eq!(restored, material);
        assert_eq!(restored.data().diffuse_color, Vec3::ONE);
        assert!(restored.diffuse_texture_path().is_none());
    }

    #[test]
    fn four_element_color_fails_without_mutating() {
        let mut material = sample_material();
        let before = material.clone();

        let err = material
            .read_node(&json!({
                "albedo": 0.2,
                "diffuseColor": [0.1, 0.2, 0.3, 0.4]
            }))
            .unwrap_err();

        assert!(matches!(err, SceneError::ConfigFormat { ref key, .. } if key == "diffuseColor"));
        assert_eq!(material, before);
    }

    #[test]
    fn short_specular_array_is_rejected() {
        let err = Material::from_node(&json!({ "specularColor": [0.5, 0.5] })).unwrap_err();
        assert!(matches!(err, SceneError::ConfigFormat { ref key, .. } if key == "specularColor"));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        assert!(Material::from_node(&json!({ "albedo": "bright" })).is_err());
        assert!(Material::from_node(&json!({ "diffuseColor": [1.0, "g", 0.0] })).is_err());
        assert!(Material::from_node(&json!({ "diffuseTexture": 4 })).is_err());
    }

    #[test]
    fn equality_is_reflexive_and_field_sensitive() {
        let material = sample_material();
        assert_eq!(material, material.clone());

        let mut other = material.clone();
        other.set_albedo(0.76);
        assert_ne!(material, other);

        let mut other = material.clone();
        other.set_specular_color(Vec3::new(0.9, 0.8, 0.71));
        assert_ne!(material, other);

        let mut other = material.clone();
        other.set_diffuse_texture("textures/other.png");
        assert_ne!(material, other);
    }

    #[test]
    fn equality_has_no_tolerance() {
        let mut a = Material::new();
        let mut b = Material::new();
        a.set_roughness(0.3);
        b.set_roughness(f32::from_bits(0.3f32.to_bits() + 1));
        assert_ne!(a, b);
    }

    #[test]
    fn texture_without_reference_is_a_state_error() {
        let loader = RecordingLoader { requested: RefCell::new(Vec::new()) };
        let material = Material::new();

        let err = material.diffuse_texture(&loader).unwrap_err();
        assert!(matches!(err.downcast_ref::<SceneError>(), Some(SceneError::ResourceState(_))));
        assert!(loader.requested.borrow().is_empty());
    }

    #[test]
    fn texture_resolves_once_a_path_is_set() {
        let loader = RecordingLoader { requested: RefCell::new(Vec::new()) };
        let mut material = Material::new();
        material.set_diffuse_texture("textures/wood.png");

        let texture = material.diffuse_texture(&loader).unwrap();
        assert_eq!(texture, "texture:textures/wood.png");
        assert_eq!(loader.requested.borrow().as_slice(), &[PathBuf::from("textures/wood.png")]);
    }

    #[test]
    fn non_finite_values_survive_save_and_read() {
        let mut material = sample_material();
        material.set_albedo(f32::INFINITY);
        material.set_roughness(f32::NAN);
        material.set_diffuse_color(Vec3::new(f32::NEG_INFINITY, 0.5, 1.0));

        let saved = material.save_node();
        assert_eq!(saved["albedo"], json!("inf"));
        assert_eq!(saved["roughness"], json!("nan"));
        assert_eq!(saved["diffuseColor"], json!(["-inf", 0.5, 1.0]));

        let restored = Material::from_node(&saved).unwrap();
        let data = restored.data();
        assert_eq!(data.albedo, f32::INFINITY);
        assert!(data.roughness.is_nan());
        assert_eq!(data.diffuse_color, Vec3::new(f32::NEG_INFINITY, 0.5, 1.0));
        assert_eq!(data.specular_color, material.data().specular_color);
        assert_eq!(restored.diffuse_texture_path(), material.diffuse_texture_path());
    }

    #[test]
    fn unknown_strings_are_still_rejected() {
        let err = Material::from_node(&json!({ "albedo": "infinity" })).unwrap_err();
        assert!(matches!(err, SceneError::ConfigFormat { ref key, .. } if key == "albedo"));
    }

    #[test]
    fn shader_data_packs_scalars_into_w() {
        let data = sample_material().data().as_shader_data();
        assert_eq!(data.diffuse.w, 0.75);
        assert_eq!(data.specular.w, 0.3);
        assert_eq!(data.diffuse.truncate(), Vec3::new(0.1, 0.2, 0.3));
    }
}
