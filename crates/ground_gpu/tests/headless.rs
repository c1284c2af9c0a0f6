//! Headless rendering against a real adapter. Skipped when none is available.

use ground_3d::prelude::*;
use ground_gpu::GpuBackend;

fn backend() -> Option<GpuBackend> {
    match GpuBackend::new_headless() {
        Ok(backend) => Some(backend),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn flat_scene() -> Scene {
    let mut camera = Camera::new(&CameraConfig {
        eye: [0.0, 0.0, 0.0],
        pitch: 0.0,
        yaw: 0.0,
        ..Default::default()
    });
    camera.set_projection(Mat4::IDENTITY);
    Scene::new(
        SceneConfig {
            seed: Some(7),
            ..Default::default()
        },
        camera,
    )
}

#[test]
fn test_gpu_pick_full_viewport() {
    let Some(mut backend) = backend() else { return };
    let mut scene = flat_scene();
    let id = scene
        .add(Renderable::new("slab", Cube).with_transform(Transform::new(
            Vec3::new(0.0, 0.0, 0.5),
            Vec3::ZERO,
            Vec3::new(1.0, 1.0, 0.25),
        )))
        .unwrap();

    scene.render(&mut backend, 32, 32).unwrap();
    assert_eq!(scene.pick(&mut backend, 16, 16, 32, 32).unwrap(), Some(id));
    assert_eq!(scene.get(id).unwrap().shading(), ShadingMode::Lit);
    assert_eq!(backend.cached_meshes(), 1);
}

#[test]
fn test_gpu_pick_background_and_out_of_bounds() {
    let Some(mut backend) = backend() else { return };
    let mut scene = flat_scene();
    scene.render(&mut backend, 16, 16).unwrap();
    assert_eq!(scene.pick(&mut backend, 4, 4, 16, 16).unwrap(), None);
    assert_eq!(scene.pick(&mut backend, 40, 4, 16, 16).unwrap(), None);
}

#[test]
fn test_gpu_read_frame_clear_color() {
    let Some(mut backend) = backend() else { return };
    let mut scene = flat_scene();
    scene.render(&mut backend, 8, 8).unwrap();
    let image = backend.read_frame().unwrap();
    assert_eq!(image.dimensions(), (8, 8));
    let expected = scene.config().clear_color.to_rgba8();
    let actual = image.get_pixel(3, 3).0;
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!(a.abs_diff(*e) <= 1, "{actual:?} vs {expected:?}");
    }
}

#[test]
fn test_gpu_evicts_textures_of_removed_renderables() {
    let Some(mut backend) = backend() else { return };
    let mut scene = flat_scene();
    let id = scene
        .add(
            Renderable::new("floor", Cube)
                .with_transform(Transform::new(Vec3::new(0.0, 0.0, 0.5), Vec3::ZERO, Vec3::new(1.0, 1.0, 0.25)))
                .with_material(Material::new().textured(true))
                .with_texture(Texture::from_image("checkerboard", checkerboard(16, 2).unwrap())),
        )
        .unwrap();

    scene.render(&mut backend, 8, 8).unwrap();
    assert_eq!(backend.cached_textures(), 1);

    // picking draws unlit, it must not evict what the screen still uses
    scene.pick(&mut backend, 4, 4, 8, 8).unwrap();
    assert_eq!(backend.cached_textures(), 1);

    scene.remove(id).unwrap();
    scene.render(&mut backend, 8, 8).unwrap();
    assert_eq!(backend.cached_textures(), 0);
    assert_eq!(backend.cached_meshes(), 0);
}
