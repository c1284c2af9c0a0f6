//! Per-vertex Phong lighting, the CPU twin of the lit shader

use ground_core::{Color, Vec3};

use crate::lights::PointLight;
use crate::materials::Material;

/// Light one vertex.
///
/// `position` and `normal` are in world space. Without a normal the vertex
/// takes the material's diffuse color unlit.
pub fn shade_vertex(
    position: Vec3,
    normal: Option<Vec3>,
    eye: Vec3,
    material: &Material,
    lights: &[PointLight],
) -> Color {
    let Some(normal) = normal else {
        return material.diffuse;
    };
    let n = normal.normalize();
    let v = (eye - position).normalize();

    let mut color = Vec3::ZERO;
    for light in lights.iter().filter(|l| l.enabled) {
        let (l, dist) = if light.is_directional() {
            (light.position.xyz().normalize(), 0.0)
        } else {
            let to_light = light.position.xyz() - position;
            let dist = to_light.length();
            (to_light * (1.0 / dist.max(1e-6)), dist)
        };
        let att = light.attenuation(dist);

        let ndotl = n.dot(l).max(0.0);
        let ambient = rgb(&light.ambient.modulate(&material.ambient));
        let diffuse = rgb(&light.diffuse.modulate(&material.diffuse)) * ndotl;
        let specular = if ndotl > 0.0 {
            let h = (l + v).normalize();
            rgb(&light.specular.modulate(&material.specular)) * n.dot(h).max(0.0).powf(material.shininess)
        } else {
            Vec3::ZERO
        };
        color = color + ambient + (diffuse + specular) * att;
    }

    Color::rgba(color.x, color.y, color.z, material.diffuse.a)
}

fn rgb(c: &Color) -> Vec3 {
    Vec3::new(c.r, c.g, c.b)
}
