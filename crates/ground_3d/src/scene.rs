//! Scene graph and color-coded picking
//!
//! A [`Scene`] indexes its renderables by their identification color. Drawing
//! the scene with every object shaded in its own identification color turns
//! a single pixel read-back into an object lookup.

use ground_core::{next_identification_color, Color, IdColor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use smallvec::SmallVec;

use crate::camera::Camera;
use crate::error::{Result, SceneError};
use crate::lights::{PointLight, MAX_LIGHTS};
use crate::render::{
    DrawCall, DrawPass, FrameTarget, FrameUniforms, RenderBackend, RenderState, Shading, OUTLINE_COLOR,
};
use crate::renderable::{Renderable, ShadingMode};
use crate::texture::{BoundTexture, TextureUnits};

/// Texture units available to one draw
pub const MAX_TEXTURE_UNITS: u32 = 8;

/// Color sampling attempts after which a warning is logged
const COLOR_ATTEMPT_WARN: u32 = 64;

/// Key of a renderable in its scene: the packed identification color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderableId(pub u32);

impl RenderableId {
    pub fn id_color(&self) -> IdColor {
        IdColor::from_key(self.0)
    }
}

impl std::fmt::Display for RenderableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_color())
    }
}

/// Scene settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Identification color samples tried before `add` gives up
    pub max_color_attempts: u32,
    /// Lights accepted by `add_light`, capped at [`MAX_LIGHTS`]
    pub max_lights: usize,
    /// Background of the visible frame
    pub clear_color: Color,
    /// Seed for identification colors; random when absent
    pub seed: Option<u64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_color_attempts: 4096,
            max_lights: MAX_LIGHTS,
            clear_color: Color::rgb(0.1, 0.1, 0.1),
            seed: None,
        }
    }
}

/// Renderables, a camera and point lights
#[derive(Debug)]
pub struct Scene {
    renderables: FxHashMap<u32, Renderable>,
    camera: Camera,
    lights: SmallVec<[PointLight; MAX_LIGHTS]>,
    rng: StdRng,
    config: SceneConfig,
    state: RenderState,
    state_initialised: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default(), Camera::default())
    }
}

impl Scene {
    pub fn new(config: SceneConfig, camera: Camera) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            renderables: FxHashMap::default(),
            camera,
            lights: SmallVec::new(),
            rng,
            config,
            state: RenderState::default(),
            state_initialised: false,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Renderables
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a renderable under a fresh identification color
    pub fn add(&mut self, mut renderable: Renderable) -> Result<RenderableId> {
        for attempt in 1..=self.config.max_color_attempts {
            let color = IdColor::from_color(next_identification_color(&mut self.rng));
            let key = color.key();

            // key 0 is the picking background
            if key == 0 || self.renderables.contains_key(&key) {
                if attempt == COLOR_ATTEMPT_WARN {
                    tracing::warn!(
                        renderables = self.renderables.len(),
                        "identification color sampling is retrying a lot"
                    );
                }
                continue;
            }

            tracing::debug!(name = renderable.name(), color = %color, attempt, "renderable added");
            renderable.set_id_color(Some(color));
            self.renderables.insert(key, renderable);
            return Ok(RenderableId(key));
        }

        Err(SceneError::SceneCapacity {
            attempts: self.config.max_color_attempts,
        })
    }

    /// Take a renderable out of the scene; absent ids are ignored
    pub fn remove(&mut self, id: RenderableId) -> Option<Renderable> {
        match self.renderables.remove(&id.0) {
            Some(mut renderable) => {
                renderable.set_id_color(None);
                Some(renderable)
            }
            None => {
                tracing::warn!(id = %id, "remove of a renderable not in the scene");
                None
            }
        }
    }

    pub fn get(&self, id: RenderableId) -> Option<&Renderable> {
        self.renderables.get(&id.0)
    }

    pub fn get_mut(&mut self, id: RenderableId) -> Option<&mut Renderable> {
        self.renderables.get_mut(&id.0)
    }

    pub fn len(&self) -> usize {
        self.renderables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderables.is_empty()
    }

    /// Renderables in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (RenderableId, &Renderable)> {
        self.renderables.iter().map(|(k, r)| (RenderableId(*k), r))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Camera and lights
    // ─────────────────────────────────────────────────────────────────────────

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Append a light, returning its index
    pub fn add_light(&mut self, light: PointLight) -> Result<usize> {
        let max = self.config.max_lights.min(MAX_LIGHTS);
        if self.lights.len() >= max {
            return Err(SceneError::LightCapacity { max });
        }
        self.lights.push(light);
        Ok(self.lights.len() - 1)
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.lights
    }

    /// Replace the state applied on the next first render
    pub fn set_render_state(&mut self, state: RenderState) {
        self.state = state;
        self.state_initialised = false;
    }

    fn frame_uniforms(&self) -> FrameUniforms {
        FrameUniforms {
            view: self.camera.view(),
            projection: self.camera.projection(),
            eye: self.camera.world_position(),
            lights: self.lights.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_state(&mut self, backend: &mut dyn RenderBackend) {
        if !self.state_initialised {
            tracing::debug!(state = ?self.state, "initialising render state");
            backend.init_state(&self.state);
            self.state_initialised = true;
        }
    }

    /// Draw every renderable to the visible target
    pub fn render(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<()> {
        self.ensure_state(backend);
        let uniforms = self.frame_uniforms();
        backend.begin_frame(FrameTarget::Screen { width, height }, &uniforms, self.config.clear_color)?;
        let drawn = self.draw_all(backend, false);
        let ended = backend.end_frame();
        drawn.and(ended)
    }

    fn draw_all(&mut self, backend: &mut dyn RenderBackend, picking: bool) -> Result<()> {
        for renderable in self.renderables.values_mut() {
            renderable.ensure_mesh()?;
        }

        let mut units = TextureUnits::new(MAX_TEXTURE_UNITS);
        for renderable in self.renderables.values() {
            let Some(mesh) = renderable.mesh() else {
                continue;
            };
            units.reset();

            let (shading, textures) = match renderable.shading() {
                ShadingMode::Lit => (
                    Shading::Lit {
                        material: renderable.material(),
                        program: renderable.lit_program(),
                    },
                    bind_textures(renderable, &mut units)?,
                ),
                ShadingMode::Unlit => (
                    Shading::Flat {
                        color: renderable.id_color().map(|c| c.to_color()).unwrap_or_default(),
                        program: renderable.unlit_program(),
                    },
                    SmallVec::new(),
                ),
            };

            tracing::trace!(name = renderable.name(), faces = mesh.face_count(), "draw");
            backend.draw(&DrawCall {
                mesh,
                model: renderable.transform(),
                pass: DrawPass::Fill,
                shading,
                textures,
            })?;

            if renderable.outline() && !picking {
                backend.draw(&DrawCall {
                    mesh,
                    model: renderable.transform(),
                    pass: DrawPass::Outline,
                    shading: Shading::Flat {
                        color: OUTLINE_COLOR,
                        program: renderable.unlit_program(),
                    },
                    textures: SmallVec::new(),
                })?;
            }
        }
        Ok(())
    }

    fn set_shading(&mut self, mode: ShadingMode) {
        for renderable in self.renderables.values_mut() {
            renderable.set_shading(mode);
        }
    }

    /// Resolve a pixel (origin top-left) to the renderable drawn there.
    ///
    /// Renders the scene off-screen in identification colors and reads back
    /// one pixel. Every renderable is lit again afterwards, also when the
    /// read-back fails.
    pub fn pick(
        &mut self,
        backend: &mut dyn RenderBackend,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<RenderableId>> {
        if x >= width || y >= height {
            tracing::debug!(x, y, width, height, "pick outside the viewport");
            return Ok(None);
        }

        self.set_shading(ShadingMode::Unlit);
        let sampled = self.render_pick(backend, x, y, width, height);
        self.set_shading(ShadingMode::Lit);

        let key = IdColor::from_rgba8(sampled?).key();
        let hit = self.renderables.contains_key(&key).then_some(RenderableId(key));
        tracing::debug!(x, y, hit = ?hit, "pick");
        Ok(hit)
    }

    fn render_pick(
        &mut self,
        backend: &mut dyn RenderBackend,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<[u8; 4]> {
        self.ensure_state(backend);
        let uniforms = self.frame_uniforms();
        backend.begin_frame(FrameTarget::Offscreen { width, height }, &uniforms, Color::BLACK)?;
        let drawn = self.draw_all(backend, true);
        let ended = backend.end_frame();
        drawn.and(ended)?;
        backend.read_pixel(x, y)
    }
}

fn bind_textures<'a>(
    renderable: &'a Renderable,
    units: &mut TextureUnits,
) -> Result<SmallVec<[BoundTexture<'a>; 2]>> {
    if !renderable.material().textured {
        return Ok(SmallVec::new());
    }
    if renderable.textures().is_empty() {
        return Err(SceneError::MissingTexture(format!(
            "'{}' uses a textured material but has no textures",
            renderable.name()
        )));
    }
    renderable.textures().iter().map(|t| t.bind(units)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraConfig;
    use crate::geometry::{Cube, Plane, Sphere};
    use crate::materials::Material;
    use crate::render::SoftwareBackend;
    use crate::texture::Texture;
    use ground_core::{Mat4, Transform, Vec3, Vec4};
    use rustc_hash::FxHashSet;

    fn seeded() -> SceneConfig {
        SceneConfig {
            seed: Some(42),
            ..Default::default()
        }
    }

    /// Camera at the origin with identity projection: NDC equals world space
    fn flat_camera() -> Camera {
        let mut camera = Camera::new(&CameraConfig {
            eye: [0.0, 0.0, 0.0],
            pitch: 0.0,
            yaw: 0.0,
            ..Default::default()
        });
        camera.set_projection(Mat4::IDENTITY);
        camera
    }

    /// A cube squashed into the depth range, filling the whole viewport
    fn slab() -> Renderable {
        Renderable::new("slab", Cube).with_transform(Transform::new(
            Vec3::new(0.0, 0.0, 0.5),
            Vec3::ZERO,
            Vec3::new(1.0, 1.0, 0.25),
        ))
    }

    #[test]
    fn test_identification_colors_are_unique() {
        let mut scene = Scene::new(seeded(), Camera::default());
        let ids: Vec<_> = (0..200)
            .map(|i| scene.add(Renderable::new(format!("cube{i}"), Cube)).unwrap())
            .collect();

        let colors: FxHashSet<_> = scene.iter().map(|(_, r)| r.id_color().unwrap().key()).collect();
        assert_eq!(colors.len(), 200);
        assert_eq!(scene.len(), 200);

        for id in &ids[..50] {
            let removed = scene.remove(*id).unwrap();
            assert!(removed.id_color().is_none());
        }
        assert_eq!(scene.len(), 150);

        // absent ids are a no-op
        assert!(scene.remove(ids[0]).is_none());
        assert_eq!(scene.len(), 150);
    }

    #[test]
    fn test_id_matches_stored_color() {
        let mut scene = Scene::new(seeded(), Camera::default());
        let id = scene.add(Renderable::new("cube", Cube)).unwrap();
        assert_eq!(scene.get(id).unwrap().id_color(), Some(id.id_color()));
    }

    #[test]
    fn test_config_from_toml() {
        let config: SceneConfig = toml::from_str(
            r#"
max_color_attempts = 10
seed = 3
clear_color = { r = 1.0, g = 0.0, b = 0.0, a = 1.0 }
"#,
        )
        .unwrap();
        assert_eq!(config.max_color_attempts, 10);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.max_lights, MAX_LIGHTS);
        assert_eq!(config.clear_color, Color::rgb(1.0, 0.0, 0.0));

        let camera: CameraConfig = toml::from_str("pitch = 0.0\neye = [0.0, 0.0, -2.0]").unwrap();
        assert_eq!(camera.eye, [0.0, 0.0, -2.0]);
        assert_eq!(camera.fov_y, 90.0);
    }

    #[test]
    fn test_capacity_error() {
        let config = SceneConfig {
            max_color_attempts: 0,
            ..seeded()
        };
        let mut scene = Scene::new(config, Camera::default());
        let err = scene.add(Renderable::new("cube", Cube)).unwrap_err();
        assert!(matches!(err, SceneError::SceneCapacity { attempts: 0 }));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_light_capacity() {
        let mut scene = Scene::default();
        for i in 0..MAX_LIGHTS {
            assert_eq!(scene.add_light(PointLight::default()).unwrap(), i);
        }
        let err = scene.add_light(PointLight::default()).unwrap_err();
        assert!(matches!(err, SceneError::LightCapacity { max: MAX_LIGHTS }));

        let config = SceneConfig {
            max_lights: 1,
            ..Default::default()
        };
        let mut scene = Scene::new(config, Camera::default());
        scene.add_light(PointLight::default()).unwrap();
        assert!(matches!(
            scene.add_light(PointLight::default()),
            Err(SceneError::LightCapacity { max: 1 })
        ));
    }

    #[test]
    fn test_pick_full_viewport() {
        let mut scene = Scene::new(seeded(), flat_camera());
        let id = scene.add(slab()).unwrap();
        let mut backend = SoftwareBackend::new();

        for (x, y) in [(0, 0), (31, 31), (16, 5), (2, 29)] {
            assert_eq!(scene.pick(&mut backend, x, y, 32, 32).unwrap(), Some(id));
        }

        // the sampled bytes are exactly the registered color
        let px = backend.read_pixel(10, 10).unwrap();
        assert_eq!(IdColor::from_rgba8(px), id.id_color());
    }

    #[test]
    fn test_pick_background_is_none() {
        let mut scene = Scene::new(seeded(), flat_camera());
        let mut backend = SoftwareBackend::new();
        assert_eq!(scene.pick(&mut backend, 3, 3, 8, 8).unwrap(), None);

        scene.add(slab()).unwrap();
        // outside the viewport
        assert_eq!(scene.pick(&mut backend, 8, 3, 8, 8).unwrap(), None);
    }

    #[test]
    fn test_pick_with_perspective_camera() {
        let mut scene = Scene::new(seeded(), Camera::default());
        let id = scene.add(Renderable::new("cube", Cube)).unwrap();
        scene.add(Renderable::new("far", Sphere::default()).with_transform(Transform::new(
            Vec3::new(30.0, 0.0, -30.0),
            Vec3::ZERO,
            Vec3::ONE,
        )))
        .unwrap();

        let (w, h) = (64, 64);
        let clip = scene.camera().view_projection().transform_vec4(Vec4::new(0.0, 0.0, 0.0, 1.0));
        let (nx, ny) = (clip.x / clip.w, clip.y / clip.w);
        let px = ((nx * 0.5 + 0.5) * w as f32) as u32;
        let py = ((0.5 - ny * 0.5) * h as f32) as u32;

        let mut backend = SoftwareBackend::new();
        assert_eq!(scene.pick(&mut backend, px, py, w, h).unwrap(), Some(id));
        // the top-left corner is background
        assert_eq!(scene.pick(&mut backend, 0, 0, w, h).unwrap(), None);
    }

    #[test]
    fn test_pick_floor_straddling_camera() {
        let camera = Camera::new(&CameraConfig {
            eye: [0.0, 0.0, 0.0],
            pitch: 0.0,
            yaw: 0.0,
            ..Default::default()
        });
        let mut scene = Scene::new(seeded(), camera);
        // 5 unit cells, the eye sits above the middle of one
        let id = scene
            .add(Renderable::new("floor", Plane::default()).with_transform(Transform::new(
                Vec3::new(2.5, -1.0, 2.5),
                Vec3::ZERO,
                Vec3::new(50.0, 1.0, 50.0),
            )))
            .unwrap();

        let mut backend = SoftwareBackend::new();
        scene.render(&mut backend, 32, 32).unwrap();
        for x in 0..32 {
            assert_eq!(scene.pick(&mut backend, x, 31, 32, 32).unwrap(), Some(id), "column {x}");
        }
        assert_eq!(scene.pick(&mut backend, 16, 0, 32, 32).unwrap(), None);
    }

    #[test]
    fn test_pick_restores_lit_shading() {
        let mut scene = Scene::new(seeded(), flat_camera());
        scene.add(slab().with_outline(true)).unwrap();
        let mut backend = SoftwareBackend::new();

        scene.pick(&mut backend, 1, 1, 4, 4).unwrap();
        assert_eq!(backend.stats().outlines, 0);
        assert!(scene.iter().all(|(_, r)| r.shading() == ShadingMode::Lit));

        scene.render(&mut backend, 4, 4).unwrap();
        assert_eq!(backend.stats().outlines, 1);
    }

    /// Backend whose read-back always fails
    #[derive(Default)]
    struct BrokenReadBack(SoftwareBackend);

    impl RenderBackend for BrokenReadBack {
        fn init_state(&mut self, state: &RenderState) {
            self.0.init_state(state)
        }
        fn begin_frame(&mut self, target: FrameTarget, uniforms: &FrameUniforms, clear: Color) -> Result<()> {
            self.0.begin_frame(target, uniforms, clear)
        }
        fn draw(&mut self, call: &DrawCall<'_>) -> Result<()> {
            self.0.draw(call)
        }
        fn end_frame(&mut self) -> Result<()> {
            self.0.end_frame()
        }
        fn read_pixel(&mut self, _x: u32, _y: u32) -> Result<[u8; 4]> {
            Err(SceneError::ReadBack("device lost".into()))
        }
    }

    #[test]
    fn test_failed_pick_still_restores_shading() {
        let mut scene = Scene::new(seeded(), flat_camera());
        scene.add(slab()).unwrap();
        let mut backend = BrokenReadBack::default();

        let err = scene.pick(&mut backend, 1, 1, 4, 4).unwrap_err();
        assert!(matches!(err, SceneError::ReadBack(_)));
        assert!(scene.iter().all(|(_, r)| r.shading() == ShadingMode::Lit));
    }

    #[test]
    fn test_empty_render_clears() {
        let mut scene = Scene::default();
        let mut backend = SoftwareBackend::new();
        scene.render(&mut backend, 4, 4).unwrap();

        let clear = scene.config().clear_color.to_rgba8();
        assert_eq!(backend.screen_pixel(0, 0), Some(clear));
        assert_eq!(backend.state(), Some(&RenderState::default()));
    }

    #[test]
    fn test_render_generates_meshes_once() {
        let mut scene = Scene::new(seeded(), Camera::default());
        let id = scene.add(Renderable::new("cube", Cube)).unwrap();
        let mut backend = SoftwareBackend::new();

        scene.render(&mut backend, 8, 8).unwrap();
        let first = scene.get(id).unwrap().mesh().unwrap().id();
        scene.render(&mut backend, 8, 8).unwrap();
        assert_eq!(scene.get(id).unwrap().mesh().unwrap().id(), first);
    }

    #[test]
    fn test_textured_material_requires_texture() {
        let mut scene = Scene::new(seeded(), Camera::default());
        let material = Material::new().textured(true);
        scene.add(Renderable::new("cube", Cube).with_material(material)).unwrap();

        let mut backend = SoftwareBackend::new();
        let err = scene.render(&mut backend, 8, 8).unwrap_err();
        assert!(matches!(err, SceneError::MissingTexture(_)));

        // a pending image fails the same way
        let mut scene = Scene::new(seeded(), Camera::default());
        scene
            .add(
                Renderable::new("cube", Cube)
                    .with_material(material)
                    .with_texture(Texture::pending("brick")),
            )
            .unwrap();
        assert!(matches!(
            scene.render(&mut backend, 8, 8),
            Err(SceneError::MissingTexture(_))
        ));
    }
}
