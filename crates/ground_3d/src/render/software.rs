//! CPU rasterizer
//!
//! Edge-function triangle fill with a depth buffer, DDA lines for outlines
//! and perspective-correct attribute interpolation. Primitives are clipped
//! against the near plane in homogeneous space before the divide; lines are
//! also clipped to the viewport before they are walked. Screen and pick
//! frames go to separate buffers, so picking never disturbs the visible image.
//! Only the texture bound to unit 0 is sampled.

use ground_core::{Color, Mat4, Vec3, Vec4};
use image::RgbaImage;
use smallvec::SmallVec;

use super::lighting::shade_vertex;
use super::{
    CullMode, DrawCall, DrawPass, FrameTarget, FrameUniforms, FrontFace, RenderBackend, RenderState, Shading,
};
use crate::error::{Result, SceneError};
use crate::texture::TextureImage;

/// One unit of depth offset, the resolution of a 24-bit depth buffer
const DEPTH_UNIT: f32 = 1.0 / 16_777_216.0;

/// Smallest `w` left after clipping, keeps the perspective divide finite
const MIN_W: f32 = 1e-5;

// ─────────────────────────────────────────────────────────────────────────────
// Framebuffer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
struct Framebuffer {
    width: u32,
    height: u32,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
}

impl Framebuffer {
    fn clear(&mut self, width: u32, height: u32, color: [u8; 4]) {
        let len = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.color.clear();
        self.color.resize(len, color);
        self.depth.clear();
        self.depth.resize(len, 1.0);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width && y < self.height).then(|| self.color[self.index(x, y)])
    }

    fn to_image(&self) -> Option<RgbaImage> {
        if self.color.is_empty() {
            return None;
        }
        let bytes = self.color.iter().flatten().copied().collect();
        RgbaImage::from_raw(self.width, self.height, bytes)
    }
}

/// A vertex after the vertex stage
#[derive(Clone, Copy, Debug)]
struct ClipVertex {
    clip: Vec4,
    color: Color,
    uv: [f32; 2],
}

impl ClipVertex {
    fn lerp(&self, other: &ClipVertex, t: f32) -> ClipVertex {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        ClipVertex {
            clip: Vec4::new(
                mix(self.clip.x, other.clip.x),
                mix(self.clip.y, other.clip.y),
                mix(self.clip.z, other.clip.z),
                mix(self.clip.w, other.clip.w),
            ),
            color: Color::rgba(
                mix(self.color.r, other.color.r),
                mix(self.color.g, other.color.g),
                mix(self.color.b, other.color.b),
                mix(self.color.a, other.color.a),
            ),
            uv: [mix(self.uv[0], other.uv[0]), mix(self.uv[1], other.uv[1])],
        }
    }
}

/// Half-spaces a vertex must lie in before the perspective divide
#[derive(Clone, Copy, Debug)]
enum ClipPlane {
    /// `z >= 0`, the near plane of a 0..1 depth range
    Near,
    /// `w >= MIN_W`
    PositiveW,
}

const CLIP_PLANES: [ClipPlane; 2] = [ClipPlane::Near, ClipPlane::PositiveW];

impl ClipPlane {
    /// Signed distance, negative outside
    #[inline]
    fn distance(self, clip: &Vec4) -> f32 {
        match self {
            ClipPlane::Near => clip.z,
            ClipPlane::PositiveW => clip.w - MIN_W,
        }
    }

    /// Point where the edge `a -> b` crosses the plane, snapped onto it
    fn intersect(self, a: &ClipVertex, b: &ClipVertex, da: f32, db: f32) -> ClipVertex {
        let mut p = a.lerp(b, da / (da - db));
        match self {
            ClipPlane::Near => p.clip.z = p.clip.z.max(0.0),
            ClipPlane::PositiveW => p.clip.w = p.clip.w.max(MIN_W),
        }
        p
    }
}

/// Sutherland-Hodgman against [`CLIP_PLANES`]. The result keeps the winding
/// of the input and is empty when the triangle is entirely clipped.
fn clip_polygon(v: &[ClipVertex; 3]) -> SmallVec<[ClipVertex; 8]> {
    let mut poly: SmallVec<[ClipVertex; 8]> = v.iter().copied().collect();
    for plane in CLIP_PLANES {
        if poly.iter().all(|p| plane.distance(&p.clip) >= 0.0) {
            continue;
        }
        let input = std::mem::take(&mut poly);
        for (i, cur) in input.iter().enumerate() {
            let next = &input[(i + 1) % input.len()];
            let (dc, dn) = (plane.distance(&cur.clip), plane.distance(&next.clip));
            if dc >= 0.0 {
                poly.push(*cur);
            }
            if (dc >= 0.0) != (dn >= 0.0) {
                poly.push(plane.intersect(cur, next, dc, dn));
            }
        }
        if poly.len() < 3 {
            poly.clear();
            break;
        }
    }
    poly
}

/// Clip the segment `a -> b` against [`CLIP_PLANES`], returning the
/// surviving parameter range
fn clip_segment(a: &ClipVertex, b: &ClipVertex) -> Option<(f32, f32)> {
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for plane in CLIP_PLANES {
        let (da, db) = (plane.distance(&a.clip), plane.distance(&b.clip));
        match (da >= 0.0, db >= 0.0) {
            (true, true) => {}
            (false, false) => return None,
            (false, true) => t0 = t0.max(da / (da - db)),
            (true, false) => t1 = t1.min(da / (da - db)),
        }
    }
    (t0 <= t1).then_some((t0, t1))
}

/// Liang-Barsky clip of `p + s * d` to `[0, width] x [0, height]`, returning
/// the surviving range of `s` within `0..=1`
fn clip_to_viewport(p: (f32, f32), d: (f32, f32), width: f32, height: f32) -> Option<(f32, f32)> {
    let (mut s0, mut s1) = (0.0f32, 1.0f32);
    let edges = [(-d.0, p.0), (d.0, width - p.0), (-d.1, p.1), (d.1, height - p.1)];
    for (q, r) in edges {
        if q == 0.0 {
            if r < 0.0 {
                return None;
            }
            continue;
        }
        let s = r / q;
        if q < 0.0 {
            s0 = s0.max(s);
        } else {
            s1 = s1.min(s);
        }
    }
    (s0 <= s1).then_some((s0, s1))
}

/// A vertex in window coordinates
#[derive(Clone, Copy, Debug)]
struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
}

/// Counters for the current frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub fills: u32,
    pub outlines: u32,
    pub triangles: u32,
    pub fragments: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Render backend that rasterizes on the CPU
#[derive(Debug, Default)]
pub struct SoftwareBackend {
    state: RenderState,
    state_initialised: bool,
    screen: Framebuffer,
    pick: Framebuffer,
    target: Option<FrameTarget>,
    uniforms: FrameUniforms,
    view_projection: Mat4,
    stats: FrameStats,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// State applied by `init_state`, if it has been called
    pub fn state(&self) -> Option<&RenderState> {
        self.state_initialised.then_some(&self.state)
    }

    /// Counters of the last (or current) frame
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Pixel of the visible frame, origin top-left
    pub fn screen_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.screen.get(x, y)
    }

    /// The visible frame as an image
    pub fn to_image(&self) -> Result<RgbaImage> {
        self.screen
            .to_image()
            .ok_or_else(|| SceneError::ReadBack("no frame has been rendered".into()))
    }

    /// The last picking frame as an image
    pub fn pick_image(&self) -> Result<RgbaImage> {
        self.pick
            .to_image()
            .ok_or_else(|| SceneError::ReadBack("no picking frame has been rendered".into()))
    }

    fn current(&mut self) -> Result<&mut Framebuffer> {
        match self.target {
            Some(FrameTarget::Screen { .. }) => Ok(&mut self.screen),
            Some(FrameTarget::Offscreen { .. }) => Ok(&mut self.pick),
            None => Err(SceneError::Backend("draw called outside of a frame".into())),
        }
    }

    fn vertex_stage(&self, call: &DrawCall<'_>) -> Vec<ClipVertex> {
        let mvp = self.view_projection * call.model;
        let normal_matrix = call.model.normal_matrix();
        let has_normals = call.mesh.layout().has_normals();

        (0..call.mesh.vertex_count())
            .map(|i| {
                let v = call.mesh.vertex(i);
                let local = Vec4::from_vec3(Vec3::from_array(v.position), 1.0);
                let color = match &call.shading {
                    Shading::Flat { color, .. } => *color,
                    Shading::Lit { material, .. } => {
                        let world = call.model.transform_vec4(local).xyz();
                        let normal = has_normals.then(|| normal_matrix.transform_vector(Vec3::from_array(v.normal)));
                        shade_vertex(world, normal, self.uniforms.eye, material, &self.uniforms.lights)
                    }
                };
                ClipVertex {
                    clip: mvp.transform_vec4(local),
                    color,
                    uv: v.uv,
                }
            })
            .collect()
    }
}

impl RenderBackend for SoftwareBackend {
    fn init_state(&mut self, state: &RenderState) {
        tracing::debug!(?state, "software backend state initialised");
        self.state = *state;
        self.state_initialised = true;
    }

    fn begin_frame(&mut self, target: FrameTarget, uniforms: &FrameUniforms, clear: Color) -> Result<()> {
        let (width, height) = target.size();
        if width == 0 || height == 0 {
            return Err(SceneError::Backend(format!("invalid frame size {}x{}", width, height)));
        }
        self.target = Some(target);
        self.uniforms = uniforms.clone();
        self.view_projection = uniforms.projection * uniforms.view;
        self.stats = FrameStats::default();
        self.current()?.clear(width, height, clear.to_rgba8());
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<()> {
        if self.target.is_none() {
            return Err(SceneError::Backend("draw called outside of a frame".into()));
        }
        let vertices = self.vertex_stage(call);
        let flat = match &call.shading {
            Shading::Flat { color, .. } => Some(color.to_rgba8()),
            Shading::Lit { .. } => None,
        };
        if call.textures.len() > 1 {
            tracing::warn!(
                bound = call.textures.len(),
                "only texture unit 0 is sampled, extra textures ignored"
            );
        }
        let texture = match &call.shading {
            Shading::Lit { .. } => call.textures.first().map(|t| t.image),
            Shading::Flat { .. } => None,
        };
        let state = self.state;

        match call.pass {
            DrawPass::Fill => {
                self.stats.fills += 1;
                let mut fragments = 0;
                let mut triangles = 0;
                let fb = self.current()?;
                for tri in call.mesh.triangle_indices().chunks_exact(3) {
                    let v = [
                        vertices[tri[0] as usize],
                        vertices[tri[1] as usize],
                        vertices[tri[2] as usize],
                    ];
                    let poly = clip_polygon(&v);
                    let mut drawn = false;
                    for i in 1..poly.len().saturating_sub(1) {
                        let piece = [poly[0], poly[i], poly[i + 1]];
                        if let Some(n) = raster_triangle(fb, &state, &piece, flat, texture) {
                            drawn = true;
                            fragments += n;
                        }
                    }
                    if drawn {
                        triangles += 1;
                    }
                }
                self.stats.triangles += triangles;
                self.stats.fragments += fragments;
            }
            DrawPass::Outline => {
                self.stats.outlines += 1;
                let fb = self.current()?;
                for edge in call.mesh.outline_indices().chunks_exact(2) {
                    let a = vertices[edge[0] as usize];
                    let b = vertices[edge[1] as usize];
                    raster_line(fb, &state, &a, &b, flat);
                }
            }
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        if self.target.take().is_none() {
            return Err(SceneError::Backend("end_frame without begin_frame".into()));
        }
        tracing::trace!(stats = ?self.stats, "software frame finished");
        Ok(())
    }

    fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4]> {
        self.pick.get(x, y).ok_or_else(|| {
            SceneError::ReadBack(format!(
                "pixel ({}, {}) outside the {}x{} picking frame",
                x, y, self.pick.width, self.pick.height
            ))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rasterization
// ─────────────────────────────────────────────────────────────────────────────

/// Perspective divide and viewport transform of a clipped vertex
fn to_screen(fb: &Framebuffer, v: &ClipVertex) -> ScreenVertex {
    let inv_w = 1.0 / v.clip.w.max(MIN_W);
    let ndc = Vec3::new(v.clip.x * inv_w, v.clip.y * inv_w, v.clip.z * inv_w);
    ScreenVertex {
        x: (ndc.x * 0.5 + 0.5) * fb.width as f32,
        y: (0.5 - ndc.y * 0.5) * fb.height as f32,
        z: ndc.z,
        inv_w,
    }
}

#[inline]
fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Fill one clipped triangle, returning the number of fragments written or
/// `None` when it was culled or degenerate
fn raster_triangle(
    fb: &mut Framebuffer,
    state: &RenderState,
    v: &[ClipVertex; 3],
    flat: Option<[u8; 4]>,
    texture: Option<&TextureImage>,
) -> Option<u64> {
    let s = [to_screen(fb, &v[0]), to_screen(fb, &v[1]), to_screen(fb, &v[2])];

    // Window y grows downward, so counter-clockwise in NDC is negative here
    let area = edge(&s[0], &s[1], s[2].x, s[2].y);
    if area == 0.0 {
        return None;
    }
    let front = match state.front_face {
        FrontFace::Ccw => area < 0.0,
        FrontFace::Cw => area > 0.0,
    };
    let culled = match state.cull_mode {
        CullMode::None => false,
        CullMode::Back => !front,
        CullMode::Front => front,
    };
    if culled {
        return None;
    }

    // Polygon offset: factor * max depth slope + units * resolution
    let dzdx = ((s[1].z - s[0].z) * (s[2].y - s[0].y) - (s[2].z - s[0].z) * (s[1].y - s[0].y)) / area;
    let dzdy = ((s[2].z - s[0].z) * (s[1].x - s[0].x) - (s[1].z - s[0].z) * (s[2].x - s[0].x)) / area;
    let bias = state.polygon_offset.factor * dzdx.abs().max(dzdy.abs()) + state.polygon_offset.units * DEPTH_UNIT;

    let min_x = s.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let min_y = s.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let max_x = s.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil();
    let max_y = s.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil();
    if max_x < 0.0 || max_y < 0.0 {
        return Some(0);
    }
    let max_x = (max_x as u32).min(fb.width);
    let max_y = (max_y as u32).min(fb.height);

    let mut written = 0;
    for py in min_y..max_y {
        for px in min_x..max_x {
            let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
            let b0 = edge(&s[1], &s[2], cx, cy) / area;
            let b1 = edge(&s[2], &s[0], cx, cy) / area;
            let b2 = edge(&s[0], &s[1], cx, cy) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }

            let z = b0 * s[0].z + b1 * s[1].z + b2 * s[2].z;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            let z = (z + bias).min(1.0);
            let idx = fb.index(px, py);
            if !state.depth_compare.passes(z, fb.depth[idx]) {
                continue;
            }

            let color = match flat {
                Some(color) => color,
                None => {
                    // perspective-correct weights
                    let w0 = b0 * s[0].inv_w;
                    let w1 = b1 * s[1].inv_w;
                    let w2 = b2 * s[2].inv_w;
                    let sum = w0 + w1 + w2;
                    let (w0, w1, w2) = (w0 / sum, w1 / sum, w2 / sum);

                    let mix = |a: f32, b: f32, c: f32| w0 * a + w1 * b + w2 * c;
                    let (c0, c1, c2) = (&v[0].color, &v[1].color, &v[2].color);
                    let mut color = Color::rgba(
                        mix(c0.r, c1.r, c2.r),
                        mix(c0.g, c1.g, c2.g),
                        mix(c0.b, c1.b, c2.b),
                        mix(c0.a, c1.a, c2.a),
                    );
                    if let Some(tex) = texture {
                        let u = w0 * v[0].uv[0] + w1 * v[1].uv[0] + w2 * v[2].uv[0];
                        let t = w0 * v[0].uv[1] + w1 * v[1].uv[1] + w2 * v[2].uv[1];
                        color = color.modulate(&tex.sample(u, t));
                    }
                    color.to_rgba8()
                }
            };

            fb.depth[idx] = z;
            fb.color[idx] = color;
            written += 1;
        }
    }
    Some(written)
}

/// Draw one line segment with a DDA walk over its visible part, returning
/// the number of points visited
fn raster_line(
    fb: &mut Framebuffer,
    state: &RenderState,
    a: &ClipVertex,
    b: &ClipVertex,
    flat: Option<[u8; 4]>,
) -> u32 {
    let Some((t0, t1)) = clip_segment(a, b) else {
        return 0;
    };
    let (a, b) = (a.lerp(b, t0), a.lerp(b, t1));
    let (sa, sb) = (to_screen(fb, &a), to_screen(fb, &b));
    let (dx, dy) = (sb.x - sa.x, sb.y - sa.y);

    let (width, height) = (fb.width as f32, fb.height as f32);
    let Some((s0, s1)) = clip_to_viewport((sa.x, sa.y), (dx, dy), width, height) else {
        return 0;
    };
    let (x0, y0) = ((sa.x + dx * s0).clamp(0.0, width), (sa.y + dy * s0).clamp(0.0, height));
    let (x1, y1) = ((sa.x + dx * s1).clamp(0.0, width), (sa.y + dy * s1).clamp(0.0, height));
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as u32;

    for i in 0..=steps {
        let f = i as f32 / steps as f32;
        let x = x0 + (x1 - x0) * f;
        let y = y0 + (y1 - y0) * f;
        if x >= width || y >= height {
            continue;
        }
        let t = s0 + (s1 - s0) * f;
        let z = sa.z + (sb.z - sa.z) * t;
        if !(0.0..=1.0).contains(&z) {
            continue;
        }
        let idx = fb.index(x as u32, y as u32);
        if !state.depth_compare.passes(z, fb.depth[idx]) {
            continue;
        }
        fb.depth[idx] = z;
        fb.color[idx] = match flat {
            Some(color) => color,
            None => {
                let mix = |p: f32, q: f32| p + (q - p) * t;
                Color::rgba(
                    mix(a.color.r, b.color.r),
                    mix(a.color.g, b.color.g),
                    mix(a.color.b, b.color.b),
                    mix(a.color.a, b.color.a),
                )
                .to_rgba8()
            }
        };
    }
    steps + 1
}
