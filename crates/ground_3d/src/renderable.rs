//! Drawable scene objects

use ground_core::{IdColor, Mat4, Transform};

use crate::error::Result;
use crate::geometry::{Mesh, Primitive, Shape, UvProjection};
use crate::materials::Material;
use crate::shaders::ShaderProgram;
use crate::texture::Texture;

/// Which program a renderable is currently drawn with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShadingMode {
    /// Material + lights
    #[default]
    Lit,
    /// Flat identification color
    Unlit,
}

/// A shape with a model transform, a material and an identification color.
///
/// The mesh is generated on first draw and kept until the shape changes.
#[derive(Clone, Debug)]
pub struct Renderable {
    name: String,
    shape: Shape,
    mesh: Option<Mesh>,
    transform: Mat4,
    material: Material,
    id_color: Option<IdColor>,
    outline: bool,
    textures: Vec<Texture>,
    shading: ShadingMode,
    lit_program: ShaderProgram,
    unlit_program: ShaderProgram,
}

impl Renderable {
    pub fn new(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
            mesh: None,
            transform: Mat4::IDENTITY,
            material: Material::default(),
            id_color: None,
            outline: false,
            textures: Vec::new(),
            shading: ShadingMode::Lit,
            lit_program: ShaderProgram::lit(),
            unlit_program: ShaderProgram::unlit(),
        }
    }

    /// Set the model transform from translation, rotation and scale
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform.to_matrix();
        self
    }

    /// Set the model matrix directly
    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.transform = matrix;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Draw face edges in black after the fill
    pub fn with_outline(mut self, outline: bool) -> Self {
        self.outline = outline;
        self
    }

    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.textures.push(texture);
        self
    }

    /// Replace the lit program
    pub fn with_program(mut self, program: ShaderProgram) -> Self {
        self.lit_program = program;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Swap the shape, dropping the cached mesh
    pub fn set_shape(&mut self, shape: impl Into<Shape>) {
        self.shape = shape.into();
        self.mesh = None;
    }

    /// Generated mesh, if it has been drawn
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// Generate the mesh if needed
    pub fn ensure_mesh(&mut self) -> Result<&Mesh> {
        let mesh = match self.mesh.take() {
            Some(mesh) => mesh,
            None => self.shape.generate()?,
        };
        Ok(self.mesh.insert(mesh))
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// The model transform split back into translation, rotation and scale
    pub fn pose(&self) -> Transform {
        self.transform.decompose()
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    pub fn outline(&self) -> bool {
        self.outline
    }

    pub fn set_outline(&mut self, outline: bool) {
        self.outline = outline;
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut Vec<Texture> {
        &mut self.textures
    }

    /// Identification color, assigned when added to a scene
    pub fn id_color(&self) -> Option<IdColor> {
        self.id_color
    }

    pub(crate) fn set_id_color(&mut self, color: Option<IdColor>) {
        self.id_color = color;
    }

    pub fn shading(&self) -> ShadingMode {
        self.shading
    }

    pub(crate) fn set_shading(&mut self, shading: ShadingMode) {
        self.shading = shading;
    }

    pub fn lit_program(&self) -> &ShaderProgram {
        &self.lit_program
    }

    pub fn unlit_program(&self) -> &ShaderProgram {
        &self.unlit_program
    }

    /// Change how sphere texture coordinates are derived.
    ///
    /// An already generated mesh keeps its geometry and only gets new UVs.
    pub fn set_uv_projection(&mut self, projection: UvProjection) -> Result<()> {
        let Shape::Sphere(sphere) = &mut self.shape else {
            tracing::debug!(renderable = %self.name, "uv projection only applies to spheres");
            return Ok(());
        };
        if sphere.uv_projection == projection {
            return Ok(());
        }
        sphere.uv_projection = projection;
        if let Some(mesh) = &self.mesh {
            self.mesh = Some(mesh.with_uvs(|v| projection.project(v.position))?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Cube, Sphere};
    use ground_core::Vec3;

    #[test]
    fn test_mesh_is_generated_once() {
        let mut r = Renderable::new("cube", Cube);
        assert!(r.mesh().is_none());
        let first = r.ensure_mesh().unwrap().id();
        let second = r.ensure_mesh().unwrap().id();
        assert_eq!(first, second);

        r.set_shape(Sphere::default());
        assert!(r.mesh().is_none());
        assert_ne!(r.ensure_mesh().unwrap().id(), first);
    }

    #[test]
    fn test_pose_round_trip() {
        let t = Transform::new(
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(0.3, -0.2, 0.1),
            Vec3::new(2.0, 1.0, 0.5),
        );
        let r = Renderable::new("cube", Cube).with_transform(t);
        let pose = r.pose();
        assert!(pose.translation.distance(t.translation) < 1e-4);
        assert!(pose.rotation.distance(t.rotation) < 1e-4);
        assert!(pose.scale.distance(t.scale) < 1e-4);
    }

    #[test]
    fn test_uv_projection_keeps_positions() {
        let mut r = Renderable::new("globe", Sphere::default());
        let before = r.ensure_mesh().unwrap().clone();
        r.set_uv_projection(UvProjection::Planar).unwrap();

        let after = r.mesh().unwrap();
        assert_ne!(after.id(), before.id());
        assert_eq!(after.vertex_count(), before.vertex_count());
        let v = after.vertex(5);
        assert_eq!(v.position, before.vertex(5).position);
        assert_eq!(v.uv, [v.position[0], v.position[2]]);
    }

    #[test]
    fn test_defaults() {
        let r = Renderable::new("cube", Cube);
        assert_eq!(r.shading(), ShadingMode::Lit);
        assert!(r.id_color().is_none());
        assert!(!r.outline());
        assert_eq!(r.transform(), Mat4::IDENTITY);
    }
}
