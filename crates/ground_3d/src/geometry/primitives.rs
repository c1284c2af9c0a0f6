//! Parametric primitives
//!
//! Every primitive is a small parameter struct implementing [`Primitive`].
//! Face counts are never hard-coded: [`Mesh::new`] derives them from the
//! emitted data, so any `divisions` value stays self-consistent.

use std::f32::consts::PI;

use ground_core::{radians, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::subdivision::{subdivide_square, subdivide_triangle, swirl};
use super::{Mesh, VertexLayout};
use crate::error::{Result, SceneError};

/// Something that can generate a mesh
pub trait Primitive {
    /// Short lowercase name, e.g. `"cube"`
    fn name(&self) -> &'static str;

    /// Build a fresh vertex buffer
    fn generate(&self) -> Result<Mesh>;
}

fn require_divisions(name: &str, divisions: u32, min: u32) -> Result<()> {
    if divisions < min {
        return Err(SceneError::degenerate(format!(
            "{} needs at least {} divisions, got {}",
            name, min, divisions
        )));
    }
    Ok(())
}

/// Append a flat-shaded triangle, normal from `(v2 - v1) x (v3 - v1)`
fn push_flat_triangle(data: &mut Vec<f32>, v1: Vec3, v2: Vec3, v3: Vec3) -> Result<()> {
    let normal = (v2 - v1).cross(v3 - v1).try_normalize()?;
    for v in [v1, v2, v3] {
        data.extend_from_slice(&v.to_array());
        data.extend_from_slice(&normal.to_array());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Cube
// ─────────────────────────────────────────────────────────────────────────────

/// Axis-aligned cube spanning -1..1, six quads with fixed face normals
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cube;

const CUBE_CORNERS: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [1.0, -1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
];

const CUBE_NORMALS: [[f32; 3]; 6] = [
    [0.0, 0.0, -1.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
];

// corner indices per face, counter-clockwise seen from outside
const CUBE_FACES: [[usize; 4]; 6] = [
    [3, 2, 1, 0],
    [7, 6, 5, 4],
    [2, 7, 4, 1],
    [6, 3, 0, 5],
    [6, 7, 2, 3],
    [0, 1, 4, 5],
];

impl Primitive for Cube {
    fn name(&self) -> &'static str {
        "cube"
    }

    fn generate(&self) -> Result<Mesh> {
        let mut data = Vec::with_capacity(6 * 4 * 6);
        for (face, normal) in CUBE_FACES.iter().zip(CUBE_NORMALS.iter()) {
            for &corner in face {
                data.extend_from_slice(&CUBE_CORNERS[corner]);
                data.extend_from_slice(normal);
            }
        }
        Mesh::new(VertexLayout::PositionNormal, 4, data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cone
// ─────────────────────────────────────────────────────────────────────────────

/// Unit cone: apex at the origin, unit-radius cap at `y = 1`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cone {
    pub divisions: u32,
}

impl Default for Cone {
    fn default() -> Self {
        Self { divisions: 12 }
    }
}

impl Primitive for Cone {
    fn name(&self) -> &'static str {
        "cone"
    }

    fn generate(&self) -> Result<Mesh> {
        require_divisions(self.name(), self.divisions, 3)?;
        let n = self.divisions;
        let step = 360.0 / n as f32;
        let mut data = Vec::with_capacity((2 * n * 3 * 6) as usize);

        // part 0: side fan around the apex, part 1: cap fan, wound the other way
        for part in 0..2 {
            let mid = Vec3::new(0.0, part as f32, 0.0);
            for i in 0..n {
                let t1 = radians(i as f32 * step);
                let t2 = radians((i + 1) as f32 * step);
                let edge1 = Vec3::new(t1.cos(), 1.0, t1.sin());
                let edge2 = Vec3::new(t2.cos(), 1.0, t2.sin());
                if part == 0 {
                    push_flat_triangle(&mut data, mid, edge1, edge2)?;
                } else {
                    push_flat_triangle(&mut data, mid, edge2, edge1)?;
                }
            }
        }
        Mesh::new(VertexLayout::PositionNormal, 3, data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cylinder
// ─────────────────────────────────────────────────────────────────────────────

/// Unit cylinder standing on the XZ plane, from `y = 0` to `y = 1`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cylinder {
    pub divisions: u32,
}

impl Default for Cylinder {
    fn default() -> Self {
        Self { divisions: 15 }
    }
}

impl Primitive for Cylinder {
    fn name(&self) -> &'static str {
        "cylinder"
    }

    fn generate(&self) -> Result<Mesh> {
        require_divisions(self.name(), self.divisions, 3)?;
        let n = self.divisions;
        let step = 360.0 / n as f32;
        let top = Vec3::new(0.0, 1.0, 0.0);
        let bottom = Vec3::ZERO;
        let mut data = Vec::with_capacity((4 * n * 3 * 6) as usize);

        for i in 0..n {
            let t1 = radians(i as f32 * step);
            let t2 = radians((i + 1) as f32 * step);
            let top1 = Vec3::new(t1.cos(), 1.0, t1.sin());
            let top2 = Vec3::new(t2.cos(), 1.0, t2.sin());
            let bot1 = Vec3::new(top1.x, 0.0, top1.z);
            let bot2 = Vec3::new(top2.x, 0.0, top2.z);

            push_flat_triangle(&mut data, top, top2, top1)?;
            push_flat_triangle(&mut data, top2, bot2, bot1)?;
            push_flat_triangle(&mut data, bot2, bottom, bot1)?;
            push_flat_triangle(&mut data, bot1, top1, top2)?;
        }
        Mesh::new(VertexLayout::PositionNormal, 3, data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sphere
// ─────────────────────────────────────────────────────────────────────────────

/// How sphere texture coordinates are derived from positions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UvProjection {
    /// `u = atan2(z, x) / 2π + 0.5`, `v = 0.5 - asin(y) / π`
    #[default]
    Spherical,
    /// `u = x`, `v = z`
    Planar,
}

impl UvProjection {
    pub fn project(&self, p: [f32; 3]) -> [f32; 2] {
        match self {
            UvProjection::Spherical => [
                p[2].atan2(p[0]) / (2.0 * PI) + 0.5,
                0.5 - p[1].clamp(-1.0, 1.0).asin() / PI,
            ],
            UvProjection::Planar => [p[0], p[2]],
        }
    }
}

/// Unit sphere on a latitude/longitude grid, one quad per cell
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub divisions: u32,
    pub uv_projection: UvProjection,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            divisions: 13,
            uv_projection: UvProjection::Spherical,
        }
    }
}

impl Primitive for Sphere {
    fn name(&self) -> &'static str {
        "sphere"
    }

    fn generate(&self) -> Result<Mesh> {
        require_divisions(self.name(), self.divisions, 3)?;
        let n = self.divisions;
        let dtheta = 180.0 / n as f32;
        let dphi = 360.0 / n as f32;
        let point = |theta: f32, phi: f32| {
            Vec3::new(theta.cos() * phi.cos(), theta.cos() * phi.sin(), theta.sin())
        };
        let mut data = Vec::with_capacity((n * n * 4 * 8) as usize);

        for i in 0..n {
            let theta1 = radians(-90.0 + i as f32 * dtheta);
            let theta2 = radians(-90.0 + (i + 1) as f32 * dtheta);
            for j in 0..n {
                let phi1 = radians(j as f32 * dphi);
                let phi2 = radians((j + 1) as f32 * dphi);

                let corners = [
                    point(theta1, phi2),
                    point(theta2, phi2),
                    point(theta2, phi1),
                    point(theta1, phi1),
                ];
                for v in corners {
                    let p = v.to_array();
                    data.extend_from_slice(&p);
                    data.extend_from_slice(&v.try_normalize()?.to_array());
                    data.extend_from_slice(&self.uv_projection.project(p));
                }
            }
        }
        Mesh::new(VertexLayout::PositionNormalUv, 4, data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plane
// ─────────────────────────────────────────────────────────────────────────────

/// Unit plane on XZ centered at the origin, facing +Y
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub rows_cols: u32,
    /// UV repeat count across the plane
    pub tiling: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            rows_cols: 10,
            tiling: 10.0,
        }
    }
}

impl Primitive for Plane {
    fn name(&self) -> &'static str {
        "plane"
    }

    fn generate(&self) -> Result<Mesh> {
        require_divisions(self.name(), self.rows_cols, 1)?;
        let n = self.rows_cols;
        let cell = 1.0 / n as f32;
        let normal = [0.0, 1.0, 0.0];
        let mut data = Vec::with_capacity((n * n * 4 * 8) as usize);

        for i in 0..n {
            let x = -0.5 + i as f32 * cell;
            for j in 0..n {
                let z = -0.5 + j as f32 * cell;
                let corners = [
                    [x, 0.0, z + cell],
                    [x + cell, 0.0, z + cell],
                    [x + cell, 0.0, z],
                    [x, 0.0, z],
                ];
                for p in corners {
                    data.extend_from_slice(&p);
                    data.extend_from_slice(&normal);
                    data.extend_from_slice(&[p[0] * self.tiling, p[2] * self.tiling]);
                }
            }
        }
        Mesh::new(VertexLayout::PositionNormalUv, 4, data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gasket
// ─────────────────────────────────────────────────────────────────────────────

/// Base polygon of a [`Gasket`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasketShape {
    #[default]
    Triangle,
    Square,
}

/// A subdivided, swirled 2D triangle or square on the `z = 0` plane
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gasket {
    pub shape: GasketShape,
    pub depth: u32,
    /// Drop the center cell at every level
    pub gasket: bool,
    /// Swirl angle per unit of radius
    pub theta: f32,
}

impl Default for Gasket {
    fn default() -> Self {
        Self {
            shape: GasketShape::Triangle,
            depth: 7,
            gasket: false,
            theta: 1.0,
        }
    }
}

impl Gasket {
    /// Subdivided and swirled outline points, two-dimensional
    pub fn points(&self) -> Vec<Vec2> {
        let mut points = match self.shape {
            GasketShape::Triangle => subdivide_triangle(
                Vec2::new(-0.5, -0.5),
                Vec2::new(0.0, 0.5),
                Vec2::new(0.5, -0.5),
                self.depth,
                self.gasket,
            ),
            GasketShape::Square => subdivide_square(
                Vec2::new(-0.5, -0.5),
                Vec2::new(-0.5, 0.5),
                Vec2::new(0.5, 0.5),
                Vec2::new(0.5, -0.5),
                self.depth,
                self.gasket,
            ),
        };
        swirl(&mut points, self.theta);
        points
    }
}

impl Primitive for Gasket {
    fn name(&self) -> &'static str {
        "gasket"
    }

    fn generate(&self) -> Result<Mesh> {
        let points = self.points();
        let mut data = Vec::with_capacity(points.len() * 3);

        // triangles are rewound counter-clockwise so they face +Z
        for tri in points.chunks_exact(3) {
            let (a, mut b, mut c) = (tri[0], tri[1], tri[2]);
            let area = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
            if area < 0.0 {
                std::mem::swap(&mut b, &mut c);
            }
            for p in [a, b, c] {
                data.extend_from_slice(&[p.x, p.y, 0.0]);
            }
        }
        Mesh::new(VertexLayout::Position, 3, data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shape
// ─────────────────────────────────────────────────────────────────────────────

/// Any of the built-in primitives
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Cube(Cube),
    Cone(Cone),
    Cylinder(Cylinder),
    Sphere(Sphere),
    Plane(Plane),
    Gasket(Gasket),
}

impl Shape {
    fn as_primitive(&self) -> &dyn Primitive {
        match self {
            Shape::Cube(p) => p,
            Shape::Cone(p) => p,
            Shape::Cylinder(p) => p,
            Shape::Sphere(p) => p,
            Shape::Plane(p) => p,
            Shape::Gasket(p) => p,
        }
    }
}

impl Primitive for Shape {
    fn name(&self) -> &'static str {
        self.as_primitive().name()
    }

    fn generate(&self) -> Result<Mesh> {
        let mesh = self.as_primitive().generate()?;
        tracing::debug!(
            shape = self.name(),
            faces = mesh.face_count(),
            vertices = mesh.vertex_count(),
            "generated mesh"
        );
        Ok(mesh)
    }
}

macro_rules! impl_shape_from {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for Shape {
                fn from(p: $ty) -> Self {
                    Shape::$ty(p)
                }
            }
        )*
    };
}

impl_shape_from!(Cube, Cone, Cylinder, Sphere, Plane, Gasket);

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_consistent(mesh: &Mesh) {
        assert_eq!(
            mesh.data().len(),
            mesh.face_count() * mesh.verts_per_face() * mesh.layout().attributes()
        );
    }

    fn assert_unit_normals(mesh: &Mesh) {
        for v in mesh.expanded_vertices() {
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-4, "normal {:?}", n);
        }
    }

    #[test]
    fn test_cube_geometry() {
        let mesh = Cube.generate().unwrap();
        assert_consistent(&mesh);
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.layout(), VertexLayout::PositionNormal);

        // Every face winds counter-clockwise around its outward normal
        for face in 0..6 {
            let v: Vec<_> = (0..4).map(|k| mesh.vertex(face * 4 + k)).collect();
            let p0 = Vec3::from_array(v[0].position);
            let p1 = Vec3::from_array(v[1].position);
            let p2 = Vec3::from_array(v[2].position);
            let wound = (p1 - p0).cross(p2 - p0);
            assert!(wound.dot(Vec3::from_array(v[0].normal)) > 0.0);
        }
    }

    #[test]
    fn test_cone_geometry() {
        for divisions in [3, 4, 12, 25] {
            let mesh = Cone { divisions }.generate().unwrap();
            assert_consistent(&mesh);
            assert_eq!(mesh.face_count(), 2 * divisions as usize);
            assert_unit_normals(&mesh);
        }

        // Cap normals point up the axis
        let mesh = Cone::default().generate().unwrap();
        let cap = mesh.vertex(mesh.vertex_count() - 1);
        assert!((cap.normal[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cylinder_geometry() {
        for divisions in [3, 15, 32] {
            let mesh = Cylinder { divisions }.generate().unwrap();
            assert_consistent(&mesh);
            assert_eq!(mesh.face_count(), 4 * divisions as usize);
            assert_unit_normals(&mesh);
        }

        let mesh = Cylinder::default().generate().unwrap();
        // top cap, side wall, bottom cap of the first slice
        assert!((mesh.vertex(0).normal[1] - 1.0).abs() < 1e-5);
        assert!(mesh.vertex(3).normal[1].abs() < 1e-5);
        assert!((mesh.vertex(6).normal[1] + 1.0).abs() < 1e-5);

        // Side wall normal points away from the axis
        let side = mesh.vertex(3);
        let radial = Vec3::new(side.position[0], 0.0, side.position[2]);
        assert!(radial.dot(Vec3::from_array(side.normal)) > 0.0);
    }

    #[test]
    fn test_sphere_geometry() {
        for divisions in [3, 13, 20] {
            let mesh = Sphere {
                divisions,
                ..Default::default()
            }
            .generate()
            .unwrap();
            assert_consistent(&mesh);
            assert_eq!(mesh.face_count(), (divisions * divisions) as usize);
            assert_unit_normals(&mesh);
        }

        let mesh = Sphere::default().generate().unwrap();
        for v in mesh.expanded_vertices() {
            let p = Vec3::from_array(v.position);
            assert!((p.length() - 1.0).abs() < 1e-5);
            assert!((p.dot(Vec3::from_array(v.normal)) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_sphere_planar_uvs() {
        let mesh = Sphere {
            divisions: 8,
            uv_projection: UvProjection::Planar,
        }
        .generate()
        .unwrap();
        for v in mesh.expanded_vertices() {
            assert_eq!(v.uv, [v.position[0], v.position[2]]);
        }
    }

    #[test]
    fn test_plane_geometry() {
        let mesh = Plane::default().generate().unwrap();
        assert_consistent(&mesh);
        assert_eq!(mesh.face_count(), 100);
        let v = mesh.vertex(0);
        assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        assert_eq!(v.position[0], -0.5);
        assert!((v.position[2] + 0.4).abs() < 1e-6);
        assert!((v.uv[0] + 5.0).abs() < 1e-5 && (v.uv[1] + 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_divisions() {
        assert!(matches!(
            Cone { divisions: 2 }.generate(),
            Err(SceneError::DegenerateGeometry(_))
        ));
        assert!(Cylinder { divisions: 0 }.generate().is_err());
        assert!(Sphere {
            divisions: 1,
            ..Default::default()
        }
        .generate()
        .is_err());
        assert!(Plane {
            rows_cols: 0,
            tiling: 1.0
        }
        .generate()
        .is_err());
    }

    #[test]
    fn test_gasket_geometry() {
        let gasket = Gasket {
            shape: GasketShape::Square,
            depth: 3,
            gasket: true,
            theta: 0.0,
        };
        let mesh = gasket.generate().unwrap();
        assert_consistent(&mesh);
        // 6 * 3^3 vertices, two triangles per leaf cell
        assert_eq!(mesh.face_count(), 2 * 27);

        let tri = Gasket {
            depth: 2,
            ..Default::default()
        };
        let mesh = tri.generate().unwrap();
        assert_eq!(mesh.face_count(), 16);
        for face in 0..mesh.face_count() {
            let a = mesh.vertex(face * 3).position;
            let b = mesh.vertex(face * 3 + 1).position;
            let c = mesh.vertex(face * 3 + 2).position;
            let area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
            assert!(area >= 0.0);
        }
    }

    #[test]
    fn test_shape_dispatch() {
        let shape: Shape = Cylinder::default().into();
        assert_eq!(shape.name(), "cylinder");
        assert_eq!(shape.generate().unwrap().face_count(), 60);
    }
}
