//! Scene description files
//!
//! A scene file is TOML with three parts:
//! - `[scene]` - [`SceneConfig`] (seed, clear color, limits)
//! - `[camera]` - [`CameraConfig`]
//! - `[[object]]` / `[[light]]` - renderables and point lights

use anyhow::{Context, Result};
use ground_3d::prelude::*;
use ground_core::radians;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level scene file
#[derive(Debug, Default, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default, rename = "object")]
    pub objects: Vec<ObjectConfig>,
    #[serde(default, rename = "light")]
    pub lights: Vec<LightConfig>,
}

/// Shape names accepted in `shape = "..."`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Cube,
    Cone,
    Cylinder,
    Sphere,
    Plane,
    Gasket,
}

impl std::str::FromStr for ShapeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cube" => Ok(Self::Cube),
            "cone" => Ok(Self::Cone),
            "cylinder" => Ok(Self::Cylinder),
            "sphere" => Ok(Self::Sphere),
            "plane" => Ok(Self::Plane),
            "gasket" => Ok(Self::Gasket),
            _ => anyhow::bail!(
                "Unknown shape '{}'. Valid shapes: cube, cone, cylinder, sphere, plane, gasket",
                s
            ),
        }
    }
}

impl ShapeKind {
    /// Build the shape, `divisions` overriding the primitive's default
    pub fn build(&self, divisions: Option<u32>) -> Shape {
        match self {
            ShapeKind::Cube => Cube.into(),
            ShapeKind::Cone => Cone {
                divisions: divisions.unwrap_or(Cone::default().divisions),
            }
            .into(),
            ShapeKind::Cylinder => Cylinder {
                divisions: divisions.unwrap_or(Cylinder::default().divisions),
            }
            .into(),
            ShapeKind::Sphere => Sphere {
                divisions: divisions.unwrap_or(Sphere::default().divisions),
                ..Default::default()
            }
            .into(),
            ShapeKind::Plane => Plane {
                rows_cols: divisions.unwrap_or(Plane::default().rows_cols),
                ..Default::default()
            }
            .into(),
            ShapeKind::Gasket => Gasket {
                depth: divisions.unwrap_or(Gasket::default().depth),
                ..Default::default()
            }
            .into(),
        }
    }
}

/// One `[[object]]` entry
#[derive(Debug, Deserialize)]
pub struct ObjectConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub shape: ShapeKind,
    #[serde(default)]
    pub divisions: Option<u32>,
    #[serde(default)]
    pub translation: [f32; 3],
    /// Degrees about X, Y, Z
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub material: MaterialConfig,
    #[serde(default)]
    pub outline: bool,
    #[serde(default)]
    pub uv_projection: Option<UvProjection>,
    /// Only `"checkerboard"` is built in
    #[serde(default)]
    pub texture: Option<String>,
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Material colors as `#rrggbb` strings
#[derive(Debug, Default, Deserialize)]
pub struct MaterialConfig {
    #[serde(default)]
    pub ambient: Option<String>,
    #[serde(default)]
    pub diffuse: Option<String>,
    #[serde(default)]
    pub specular: Option<String>,
    #[serde(default)]
    pub shininess: Option<f32>,
}

impl MaterialConfig {
    pub fn to_material(&self) -> Result<Material> {
        let mut material = Material::default();
        if let Some(hex) = &self.ambient {
            material.ambient = parse_color(hex)?;
        }
        if let Some(hex) = &self.diffuse {
            material.diffuse = parse_color(hex)?;
        }
        if let Some(hex) = &self.specular {
            material.specular = parse_color(hex)?;
        }
        if let Some(shininess) = self.shininess {
            material.shininess = shininess;
        }
        Ok(material)
    }
}

/// One `[[light]]` entry
#[derive(Debug, Deserialize)]
pub struct LightConfig {
    pub position: [f32; 3],
    /// `false` makes the light directional
    #[serde(default = "default_true")]
    pub positional: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub ambient: Option<String>,
    #[serde(default)]
    pub diffuse: Option<String>,
    #[serde(default)]
    pub specular: Option<String>,
    /// (constant, linear, quadratic)
    #[serde(default)]
    pub attenuation: Option<[f32; 3]>,
}

fn default_true() -> bool {
    true
}

impl LightConfig {
    pub fn to_light(&self) -> Result<PointLight> {
        let [x, y, z] = self.position;
        let mut light = PointLight::new(Vec3::new(x, y, z)).enabled(self.enabled);
        if !self.positional {
            light.position = Vec4::new(x, y, z, 0.0);
        }
        if let Some(hex) = &self.ambient {
            light = light.ambient(parse_color(hex)?);
        }
        if let Some(hex) = &self.diffuse {
            light = light.diffuse(parse_color(hex)?);
        }
        if let Some(hex) = &self.specular {
            light = light.specular(parse_color(hex)?);
        }
        if let Some([c, l, q]) = self.attenuation {
            light = light.attenuation_coefficients(c, l, q);
        }
        Ok(light)
    }
}

fn parse_color(hex: &str) -> Result<Color> {
    Color::from_hex_str(hex).with_context(|| format!("Invalid color '{}'", hex))
}

fn vec3(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

impl ObjectConfig {
    pub fn to_renderable(&self, index: usize) -> Result<Renderable> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{}{}", format!("{:?}", self.shape).to_lowercase(), index));
        let rotation = Vec3::new(
            radians(self.rotation[0]),
            radians(self.rotation[1]),
            radians(self.rotation[2]),
        );

        let mut material = self.material.to_material()?;
        let mut renderable = Renderable::new(name, self.shape.build(self.divisions))
            .with_transform(Transform::new(vec3(self.translation), rotation, vec3(self.scale)))
            .with_outline(self.outline);

        match self.texture.as_deref() {
            None => {}
            Some("checkerboard") => {
                material = material.textured(true);
                renderable = renderable.with_texture(Texture::from_image("checkerboard", checkerboard(256, 8)?));
            }
            Some(other) => anyhow::bail!("Unknown texture '{}'. Built-in textures: checkerboard", other),
        }
        renderable = renderable.with_material(material);

        if let Some(projection) = self.uv_projection {
            renderable
                .set_uv_projection(projection)
                .with_context(|| format!("Failed to set uv projection on '{}'", renderable.name()))?;
        }
        Ok(renderable)
    }
}

impl SceneFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build the scene, fixing the camera aspect to the output size
    pub fn build(&self, width: u32, height: u32) -> Result<Scene> {
        let camera = Camera::new(&CameraConfig {
            aspect: width as f32 / height as f32,
            ..self.camera.clone()
        });
        let mut scene = Scene::new(self.scene.clone(), camera);

        for light in &self.lights {
            scene.add_light(light.to_light()?)?;
        }
        for (i, object) in self.objects.iter().enumerate() {
            scene.add(object.to_renderable(i)?)?;
        }
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r##"
[scene]
seed = 3

[camera]
eye = [0.0, 0.0, -4.0]
pitch = 0.0

[[object]]
shape = "sphere"
divisions = 20
translation = [1.0, 0.0, 0.0]
rotation = [0.0, 30.0, 0.0]
outline = true
uv_projection = "planar"
material = { diffuse = "#336699", shininess = 12.0 }

[[object]]
name = "floor"
shape = "plane"
texture = "checkerboard"

[[light]]
position = [2.0, 2.0, 2.0]
attenuation = [1.0, 0.0, 0.0]
"##;

    #[test]
    fn test_parse_scene_file() {
        let file = SceneFile::parse(DEMO).unwrap();
        assert_eq!(file.scene.seed, Some(3));
        assert_eq!(file.camera.eye, [0.0, 0.0, -4.0]);
        assert_eq!(file.objects.len(), 2);
        assert_eq!(file.objects[0].shape, ShapeKind::Sphere);
        assert_eq!(file.objects[0].scale, [1.0, 1.0, 1.0]);
        assert_eq!(file.objects[1].texture.as_deref(), Some("checkerboard"));
        assert_eq!(file.lights.len(), 1);
    }

    #[test]
    fn test_build_scene() {
        let file = SceneFile::parse(DEMO).unwrap();
        let scene = file.build(64, 32).unwrap();
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.lights().len(), 1);
        assert_eq!(scene.lights()[0].constant_attenuation, 1.0);

        let sphere = scene.iter().find(|(_, r)| r.name() == "sphere0").unwrap().1;
        assert!(sphere.outline());
        assert_eq!(sphere.material().shininess, 12.0);
        assert_eq!(sphere.material().diffuse.to_hex_string(), "#336699");
        assert!((sphere.pose().rotation.y - radians(30.0)).abs() < 1e-4);

        let floor = scene.iter().find(|(_, r)| r.name() == "floor").unwrap().1;
        assert!(floor.material().textured);
        assert_eq!(floor.textures().len(), 1);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = SceneFile::parse("").unwrap();
        assert!(file.objects.is_empty());
        assert_eq!(file.scene.max_color_attempts, 4096);
        assert_eq!(file.camera.fov_y, 90.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(SceneFile::parse("[[object]]\nshape = \"torus\"").is_err());
        let file = SceneFile::parse("[[object]]\nshape = \"cube\"\nmaterial = { diffuse = \"#zz\" }").unwrap();
        assert!(file.build(8, 8).is_err());
        assert!("teapot".parse::<ShapeKind>().is_err());
        assert_eq!("Cone".parse::<ShapeKind>().unwrap(), ShapeKind::Cone);
    }

    #[test]
    fn test_shape_divisions_override() {
        assert_eq!(
            ShapeKind::Cylinder.build(Some(30)),
            Shape::Cylinder(Cylinder { divisions: 30 })
        );
        assert_eq!(ShapeKind::Cone.build(None), Shape::Cone(Cone::default()));
    }

    #[test]
    fn test_bundled_demo_scene_renders() {
        let file = SceneFile::parse(include_str!("../../../demos/scene.toml")).unwrap();
        let mut scene = file.build(96, 64).unwrap();
        assert_eq!(scene.len(), 4);
        assert_eq!(scene.lights().len(), 2);

        let mut backend = SoftwareBackend::new();
        scene.render(&mut backend, 96, 64).unwrap();
        assert_eq!(backend.to_image().unwrap().dimensions(), (96, 64));
    }
}
