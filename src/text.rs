//! Extruded text geometry.

use three_d::prelude::*;
use three_d::{vec2, vec3, CpuMesh, Indices, Positions, Vec2, Vec3};

use crate::font::TypefaceFont;
use crate::shape::{shapes_from_contours, triangulate, Shape};


#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextOptions {
    pub size: f32,
    /// Extent along +Z; the back face sits at z = 0
    pub depth: f32,
    pub curve_segments: u32,
}


/// Builds a closed, flat-shaded text mesh with the baseline of the first line at y = 0
pub fn text_mesh(font: &TypefaceFont, text: &str, options: &TextOptions) -> CpuMesh {
    let contours = font.text_contours(text, options.size, options.curve_segments);
    let shapes = shapes_from_contours(contours);
    extrude(&shapes, options.depth)
}


/// Straight extrusion without bevel: front cap, back cap and side walls
pub fn extrude(shapes: &[Shape], depth: f32) -> CpuMesh {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for shape in shapes {
        let (outline, triangles) = triangulate(shape);

        // front cap
        let base = positions.len() as u32;
        positions.extend(outline.iter().map(|p| vec3(p.x, p.y, depth)));
        normals.extend(outline.iter().map(|_| vec3(0.0, 0.0, 1.0)));
        for t in &triangles {
            indices.extend_from_slice(&[base + t[0], base + t[1], base + t[2]]);
        }

        // back cap, reversed winding
        let base = positions.len() as u32;
        positions.extend(outline.iter().map(|p| vec3(p.x, p.y, 0.0)));
        normals.extend(outline.iter().map(|_| vec3(0.0, 0.0, -1.0)));
        for t in &triangles {
            indices.extend_from_slice(&[base + t[0], base + t[2], base + t[1]]);
        }

        if depth <= 0.0 {
            continue;
        }
        let outer = oriented_ring(&shape.outer, true);
        let holes = shape.holes.iter().map(|h| oriented_ring(h, false));
        for ring in std::iter::once(outer).chain(holes) {
            for i in 0..ring.len() {
                let (p0, p1) = (ring[i], ring[(i + 1) % ring.len()]);
                let edge = p1 - p0;
                if edge.magnitude2() == 0.0 {
                    continue;
                }
                let outward = vec2(edge.y, -edge.x).normalize();
                let normal = vec3(outward.x, outward.y, 0.0);

                let base = positions.len() as u32;
                positions.extend_from_slice(&[
                    vec3(p0.x, p0.y, 0.0),
                    vec3(p1.x, p1.y, 0.0),
                    vec3(p1.x, p1.y, depth),
                    vec3(p0.x, p0.y, depth),
                ]);
                normals.extend_from_slice(&[normal; 4]);
                indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }
    }

    CpuMesh {
        positions: Positions::F32(positions),
        indices: Indices::U32(indices),
        normals: Some(normals),
        ..Default::default()
    }
}


fn oriented_ring(ring: &[Vec2], counter_clockwise: bool) -> Vec<Vec2> {
    let mut ring = ring.to_vec();
    if (crate::shape::signed_area(&ring) > 0.0) != counter_clockwise {
        ring.reverse();
    }
    ring
}


/// Number of triangles in a mesh built by this module
pub fn triangle_count(mesh: &CpuMesh) -> usize {
    match &mesh.indices {
        Indices::U32(indices) => indices.len() / 3,
        Indices::U16(indices) => indices.len() / 3,
        Indices::U8(indices) => indices.len() / 3,
        Indices::None => mesh.positions.len() / 3,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::tests::TEST_FONT;

    fn options() -> TextOptions {
        TextOptions {
            size: 0.2,
            depth: 0.2,
            curve_segments: 12,
        }
    }

    fn unit_square() -> Shape {
        Shape {
            outer: vec![vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(1.0, 1.0), vec2(0.0, 1.0)],
            holes: vec![],
        }
    }

    #[test]
    fn extruded_square_is_a_box() {
        let mesh = extrude(&[unit_square()], 0.5);
        // 2 caps of 2 triangles + 4 walls of 2 triangles
        assert_eq!(triangle_count(&mesh), 12);
        let aabb = mesh.compute_aabb();
        assert!((aabb.min() - vec3(0.0, 0.0, 0.0)).magnitude() < 1e-6);
        assert!((aabb.max() - vec3(1.0, 1.0, 0.5)).magnitude() < 1e-6);
    }

    #[test]
    fn side_normals_point_outward() {
        let mesh = extrude(&[unit_square()], 1.0);
        let positions = mesh.positions.to_f32();
        let normals = mesh.normals.as_ref().unwrap();
        let center = vec3(0.5, 0.5, 0.5);
        for (p, n) in positions.iter().zip(normals.iter()) {
            if n.z == 0.0 {
                assert!((*p - center).dot(*n) > 0.0);
            }
        }
    }

    #[test]
    fn flat_text_has_caps_only() {
        let mesh = extrude(&[unit_square()], 0.0);
        assert_eq!(triangle_count(&mesh), 4);
    }

    #[test]
    fn text_mesh_sits_on_the_baseline() {
        let font = TypefaceFont::from_slice("test.json", TEST_FONT.as_bytes()).unwrap();
        let mesh = text_mesh(&font, "II", &options());
        assert!(triangle_count(&mesh) > 0);
        let aabb = mesh.compute_aabb();
        assert!(aabb.min().y.abs() < 1e-6);
        assert!((aabb.max().y - 0.14).abs() < 1e-5);
        assert!((aabb.max().z - 0.2).abs() < 1e-6);
        // second glyph starts one advance to the right
        assert!((aabb.max().x - (0.08 + 0.06)).abs() < 1e-5);
    }

    #[test]
    fn blank_text_gives_an_empty_mesh() {
        let font = TypefaceFont::from_slice("test.json", TEST_FONT.as_bytes()).unwrap();
        let mesh = text_mesh(&font, "  ", &options());
        assert_eq!(triangle_count(&mesh), 0);
    }
}
