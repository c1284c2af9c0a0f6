//! Geometry: interleaved meshes, recursive subdivision and parametric primitives

mod primitives;
mod subdivision;

pub use primitives::{
    Cone, Cube, Cylinder, Gasket, GasketShape, Plane, Primitive, Shape, Sphere, UvProjection,
};
pub use subdivision::{subdivide_square, subdivide_triangle, swirl};

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SceneError};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one generated vertex buffer.
///
/// Every (re)generation produces a new id, so backends can key cached GPU
/// buffers on it and never see stale data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

impl MeshId {
    fn next() -> Self {
        MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which attributes each interleaved vertex carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// Position only
    Position,
    /// Position + Normal
    PositionNormal,
    /// Position + Normal + UV
    PositionNormalUv,
}

impl VertexLayout {
    /// Floats per vertex
    pub const fn attributes(&self) -> usize {
        match self {
            VertexLayout::Position => 3,
            VertexLayout::PositionNormal => 6,
            VertexLayout::PositionNormalUv => 8,
        }
    }

    pub const fn has_normals(&self) -> bool {
        !matches!(self, VertexLayout::Position)
    }

    pub const fn has_uvs(&self) -> bool {
        matches!(self, VertexLayout::PositionNormalUv)
    }
}

/// Expanded vertex, the format uploaded to the GPU
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
        }
    }
}

/// An immutable interleaved vertex buffer grouped into faces.
///
/// Each face is `verts_per_face` consecutive vertices drawn as a triangle fan
/// (filled) or a closed line loop (outlined).
#[derive(Clone, Debug)]
pub struct Mesh {
    id: MeshId,
    layout: VertexLayout,
    verts_per_face: usize,
    faces: usize,
    data: Vec<f32>,
}

impl Mesh {
    /// Wrap interleaved data, deriving the face count from its length
    pub fn new(layout: VertexLayout, verts_per_face: usize, data: Vec<f32>) -> Result<Self> {
        let stride = layout.attributes() * verts_per_face;
        if verts_per_face < 3 || data.len() % stride != 0 {
            return Err(SceneError::InvalidMesh {
                expected: stride,
                actual: data.len(),
            });
        }
        let faces = data.len() / stride;

        Ok(Self {
            id: MeshId::next(),
            layout,
            verts_per_face,
            faces,
            data,
        })
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    pub fn verts_per_face(&self) -> usize {
        self.verts_per_face
    }

    pub fn face_count(&self) -> usize {
        self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.layout.attributes()
    }

    /// Raw interleaved floats
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of triangles once every face is fanned
    pub fn triangle_count(&self) -> usize {
        self.faces * (self.verts_per_face - 2)
    }

    /// Vertex `i` expanded to the full attribute set
    pub fn vertex(&self, i: usize) -> Vertex {
        let a = self.layout.attributes();
        let v = &self.data[i * a..(i + 1) * a];
        let mut out = Vertex {
            position: [v[0], v[1], v[2]],
            ..Vertex::default()
        };
        if self.layout.has_normals() {
            out.normal = [v[3], v[4], v[5]];
        }
        if self.layout.has_uvs() {
            out.uv = [v[6], v[7]];
        }
        out
    }

    /// All vertices expanded to [`Vertex`]
    pub fn expanded_vertices(&self) -> Vec<Vertex> {
        (0..self.vertex_count()).map(|i| self.vertex(i)).collect()
    }

    /// Triangle list indices fanning each face from its first vertex
    pub fn triangle_indices(&self) -> Vec<u32> {
        let vpf = self.verts_per_face as u32;
        let mut indices = Vec::with_capacity(self.triangle_count() * 3);
        for face in 0..self.faces as u32 {
            let base = face * vpf;
            for k in 1..vpf - 1 {
                indices.extend_from_slice(&[base, base + k, base + k + 1]);
            }
        }
        indices
    }

    /// Line list indices tracing each face as a closed loop
    pub fn outline_indices(&self) -> Vec<u32> {
        let vpf = self.verts_per_face as u32;
        let mut indices = Vec::with_capacity(self.faces * self.verts_per_face * 2);
        for face in 0..self.faces as u32 {
            let base = face * vpf;
            for k in 0..vpf {
                indices.extend_from_slice(&[base + k, base + (k + 1) % vpf]);
            }
        }
        indices
    }

    /// Replace the UVs of every vertex, keeping positions and normals.
    ///
    /// The result is a new buffer with a new id.
    pub fn with_uvs(&self, mut uv: impl FnMut(&Vertex) -> [f32; 2]) -> Result<Mesh> {
        if !self.layout.has_uvs() {
            return Err(SceneError::InvalidMesh {
                expected: VertexLayout::PositionNormalUv.attributes(),
                actual: self.layout.attributes(),
            });
        }
        let mut data = self.data.clone();
        for (i, chunk) in data.chunks_exact_mut(8).enumerate() {
            let [u, v] = uv(&self.vertex(i));
            chunk[6] = u;
            chunk[7] = v;
        }
        Mesh::new(self.layout, self.verts_per_face, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        #[rustfmt::skip]
        let data = vec![
            0.0, 0.0, 0.0,
            1.0, 0.0, 0.0,
            1.0, 1.0, 0.0,
            0.0, 1.0, 0.0,
        ];
        Mesh::new(VertexLayout::Position, 4, data).unwrap()
    }

    #[test]
    fn test_mesh_counts() {
        let mesh = quad();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangle_indices(), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.outline_indices(), vec![0, 1, 1, 2, 2, 3, 3, 0]);
    }

    #[test]
    fn test_mesh_rejects_partial_face() {
        let err = Mesh::new(VertexLayout::PositionNormal, 3, vec![0.0; 20]).unwrap_err();
        assert!(matches!(err, SceneError::InvalidMesh { expected: 18, actual: 20 }));
    }

    #[test]
    fn test_mesh_ids_are_unique() {
        assert_ne!(quad().id(), quad().id());
    }

    #[test]
    fn test_expanded_vertex_defaults() {
        let v = quad().vertex(2);
        assert_eq!(v.position, [1.0, 1.0, 0.0]);
        assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }
}
