//! Recursive triangle and square subdivision (Sierpinski gasket / carpet)
//!
//! Both generators are pure: each call returns an owned vertex list and the
//! recursive cases concatenate the lists of their sub-cells. Output order is
//! fixed by the corner order of the input.

use ground_core::{mix, Vec2};

/// Subdivide `abc` `depth` times, returning a flat triangle list.
///
/// Each level splits a triangle at its edge midpoints into three corner
/// triangles plus the medial triangle. In gasket mode the medial triangle is
/// dropped at every level, so the output holds `3 * 3^depth` vertices instead
/// of `3 * 4^depth`.
pub fn subdivide_triangle(a: Vec2, b: Vec2, c: Vec2, depth: u32, gasket: bool) -> Vec<Vec2> {
    if depth == 0 {
        return vec![a, b, c];
    }

    let ab = mix(a, b, 0.5);
    let ac = mix(a, c, 0.5);
    let bc = mix(b, c, 0.5);

    let mut cells = vec![[ab, b, bc], [a, ab, ac], [ac, bc, c]];
    if !gasket {
        cells.push([ac, ab, bc]);
    }

    cells
        .into_iter()
        .flat_map(|[p, q, r]| subdivide_triangle(p, q, r, depth - 1, gasket))
        .collect()
}

/// Subdivide the quad `abcd` `depth` times, returning a flat triangle list.
///
/// At depth 0 the quad is emitted as `[a, b, c, b, c, d]`. Deeper levels split
/// it at the edge midpoints and the center into four cells and emit each leaf
/// cell `s` as `[s0, s1, s2, s2, s3, s0]`. Gasket mode drops the `d` corner
/// cell at every level.
pub fn subdivide_square(a: Vec2, b: Vec2, c: Vec2, d: Vec2, depth: u32, gasket: bool) -> Vec<Vec2> {
    if depth == 0 {
        return vec![a, b, c, b, c, d];
    }
    split_square([a, b, c, d], depth, gasket)
}

fn split_square([a, b, c, d]: [Vec2; 4], depth: u32, gasket: bool) -> Vec<Vec2> {
    let ab = mix(a, b, 0.5);
    let ad = mix(a, d, 0.5);
    let bc = mix(b, c, 0.5);
    let cd = mix(c, d, 0.5);
    let mid = mix(ab, cd, 0.5);

    let mut cells = vec![[a, ab, mid, ad], [ab, b, bc, mid], [mid, bc, c, cd]];
    if !gasket {
        cells.push([ad, mid, cd, d]);
    }

    let depth = depth - 1;
    cells
        .into_iter()
        .flat_map(|s| {
            if depth > 0 {
                split_square(s, depth, gasket)
            } else {
                vec![s[0], s[1], s[2], s[2], s[3], s[0]]
            }
        })
        .collect()
}

/// Rotate every point about the origin by `theta` scaled by its own distance
/// from the origin, twisting the shape into a swirl.
pub fn swirl(points: &mut [Vec2], theta: f32) {
    for p in points.iter_mut() {
        let (s, c) = (theta * p.length()).sin_cos();
        *p = Vec2::new(p.x * c - p.y * s, p.x * s + p.y * c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Vec2 = Vec2::new(-0.5, -0.5);
    const B: Vec2 = Vec2::new(0.0, 0.5);
    const C: Vec2 = Vec2::new(0.5, -0.5);

    const SA: Vec2 = Vec2::new(-0.5, -0.5);
    const SB: Vec2 = Vec2::new(-0.5, 0.5);
    const SC: Vec2 = Vec2::new(0.5, 0.5);
    const SD: Vec2 = Vec2::new(0.5, -0.5);

    #[test]
    fn test_triangle_depth_zero() {
        assert_eq!(subdivide_triangle(A, B, C, 0, false), vec![A, B, C]);
        assert_eq!(subdivide_triangle(A, B, C, 0, true), vec![A, B, C]);
    }

    #[test]
    fn test_square_depth_zero() {
        assert_eq!(
            subdivide_square(SA, SB, SC, SD, 0, false),
            vec![SA, SB, SC, SB, SC, SD]
        );
        assert_eq!(
            subdivide_square(SA, SB, SC, SD, 0, true),
            vec![SA, SB, SC, SB, SC, SD]
        );
    }

    #[test]
    fn test_triangle_vertex_counts() {
        for depth in 0..6 {
            let full = subdivide_triangle(A, B, C, depth, false);
            let gasket = subdivide_triangle(A, B, C, depth, true);
            assert_eq!(full.len(), 3 * 4usize.pow(depth));
            assert_eq!(gasket.len(), 3 * 3usize.pow(depth));
        }
    }

    #[test]
    fn test_square_vertex_counts() {
        for depth in 0..6 {
            let full = subdivide_square(SA, SB, SC, SD, depth, false);
            let gasket = subdivide_square(SA, SB, SC, SD, depth, true);
            assert_eq!(full.len(), 6 * 4usize.pow(depth));
            assert_eq!(gasket.len(), 6 * 3usize.pow(depth));
        }
    }

    #[test]
    fn test_triangle_depth_one_order() {
        let ab = Vec2::new(-0.25, 0.0);
        let ac = Vec2::new(0.0, -0.5);
        let bc = Vec2::new(0.25, 0.0);

        let out = subdivide_triangle(A, B, C, 1, false);
        assert_eq!(out, vec![ab, B, bc, A, ab, ac, ac, bc, C, ac, ab, bc]);

        // Gasket drops only the medial triangle
        let out = subdivide_triangle(A, B, C, 1, true);
        assert_eq!(out, vec![ab, B, bc, A, ab, ac, ac, bc, C]);
    }

    #[test]
    fn test_square_depth_one_order() {
        let ab = Vec2::new(-0.5, 0.0);
        let ad = Vec2::new(0.0, -0.5);
        let bc = Vec2::new(0.0, 0.5);
        let cd = Vec2::new(0.5, 0.0);
        let mid = Vec2::new(0.0, 0.0);

        let out = subdivide_square(SA, SB, SC, SD, 1, true);
        assert_eq!(
            out,
            vec![
                SA, ab, mid, mid, ad, SA, //
                ab, SB, bc, bc, mid, ab, //
                mid, bc, SC, SC, cd, mid,
            ]
        );

        let full = subdivide_square(SA, SB, SC, SD, 1, false);
        assert_eq!(&full[18..], &[ad, mid, cd, cd, SD, ad]);
    }

    #[test]
    fn test_subdivision_is_deterministic() {
        assert_eq!(
            subdivide_square(SA, SB, SC, SD, 4, true),
            subdivide_square(SA, SB, SC, SD, 4, true)
        );
        assert_eq!(
            subdivide_triangle(A, B, C, 4, false),
            subdivide_triangle(A, B, C, 4, false)
        );
    }

    #[test]
    fn test_swirl_zero_is_identity() {
        let original = subdivide_triangle(A, B, C, 3, true);
        let mut points = original.clone();
        swirl(&mut points, 0.0);
        assert_eq!(points, original);
    }

    #[test]
    fn test_swirl_scales_with_radius() {
        let mut points = vec![Vec2::new(1.0, 0.0), Vec2::new(0.5, 0.0), Vec2::ZERO];
        swirl(&mut points, std::f32::consts::FRAC_PI_2);

        // Unit radius turns a quarter, half radius an eighth, the origin stays
        assert!(points[0].x.abs() < 1e-6 && (points[0].y - 1.0).abs() < 1e-6);
        let eighth = std::f32::consts::FRAC_PI_4;
        assert!((points[1].x - 0.5 * eighth.cos()).abs() < 1e-6);
        assert!((points[1].y - 0.5 * eighth.sin()).abs() < 1e-6);
        assert_eq!(points[2], Vec2::ZERO);
    }
}
