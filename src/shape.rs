//! Planar shapes with holes and their triangulation.

use three_d::prelude::*;
use three_d::Vec2;


const EPSILON: f32 = 1e-9;


/// An outer contour (counter-clockwise) with zero or more holes (clockwise)
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub outer: Vec<Vec2>,
    pub holes: Vec<Vec<Vec2>>,
}


/// Twice the signed area; positive for counter-clockwise contours
fn doubled_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum()
}


pub fn signed_area(points: &[Vec2]) -> f32 {
    0.5 * doubled_area(points)
}


/// Even-odd ray cast
pub fn point_in_polygon(p: Vec2, polygon: &[Vec2]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}


/// Removes repeated consecutive points, including a closing copy of the first point
fn clean(mut contour: Vec<Vec2>) -> Vec<Vec2> {
    contour.dedup_by(|a, b| same(*a, *b));
    while contour.len() > 1 && same(contour[0], contour[contour.len() - 1]) {
        contour.pop();
    }
    contour
}


#[inline(always)]
fn same(a: Vec2, b: Vec2) -> bool {
    (a.x - b.x).abs() < 1e-7 && (a.y - b.y).abs() < 1e-7
}


/// Groups closed contours into shapes.
///
/// A contour nested inside an odd number of other contours is a hole of the
/// smallest contour containing it; everything else is an outer boundary.
/// Winding in the input does not matter.
pub fn shapes_from_contours(contours: Vec<Vec<Vec2>>) -> Vec<Shape> {
    let contours: Vec<Vec<Vec2>> = contours
        .into_iter()
        .map(clean)
        .filter(|c| c.len() >= 3 && signed_area(c).abs() > EPSILON)
        .collect();
    let areas: Vec<f32> = contours.iter().map(|c| signed_area(c).abs()).collect();

    let containers: Vec<Vec<usize>> = (0..contours.len())
        .map(|i| {
            let sample = contours[i][0];
            (0..contours.len())
                .filter(|&j| j != i && areas[j] > areas[i] && point_in_polygon(sample, &contours[j]))
                .collect()
        })
        .collect();

    let mut shapes: Vec<Shape> = Vec::new();
    let mut shape_of: Vec<Option<usize>> = vec![None; contours.len()];
    for i in 0..contours.len() {
        if containers[i].len() % 2 == 0 {
            shape_of[i] = Some(shapes.len());
            shapes.push(Shape {
                outer: oriented(&contours[i], true),
                holes: Vec::new(),
            });
        }
    }
    for i in 0..contours.len() {
        if containers[i].len() % 2 == 1 {
            let parent = containers[i]
                .iter()
                .copied()
                .filter(|&j| containers[j].len() + 1 == containers[i].len())
                .min_by(|&a, &b| areas[a].total_cmp(&areas[b]));
            if let Some(shape) = parent.and_then(|j| shape_of[j]) {
                shapes[shape].holes.push(oriented(&contours[i], false));
            }
        }
    }
    shapes
}


fn oriented(contour: &[Vec2], counter_clockwise: bool) -> Vec<Vec2> {
    let mut c = contour.to_vec();
    if (signed_area(&c) > 0.0) != counter_clockwise {
        c.reverse();
    }
    c
}


#[inline(always)]
fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}


/// Proper intersection of segments p1-p2 and q1-q2 (shared endpoints do not count)
fn segments_cross(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    if same(p1, q1) || same(p1, q2) || same(p2, q1) || same(p2, q2) {
        return false;
    }
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}


fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}


/// Triangulates a shape by ear clipping after bridging every hole into the
/// outer contour. Returns the vertex list (outer vertices first, then each
/// hole's) and counter-clockwise triangles indexing into it.
pub fn triangulate(shape: &Shape) -> (Vec<Vec2>, Vec<[u32; 3]>) {
    let mut vertices: Vec<Vec2> = oriented(&shape.outer, true);
    let mut polygon: Vec<usize> = (0..vertices.len()).collect();

    let mut holes: Vec<Vec<usize>> = Vec::new();
    for hole in &shape.holes {
        let start = vertices.len();
        vertices.extend(oriented(hole, false));
        holes.push((start..vertices.len()).collect());
    }
    // rightmost holes first keeps bridges short and non-overlapping
    holes.sort_by(|a, b| {
        let max_x = |h: &Vec<usize>| h.iter().map(|&i| vertices[i].x).fold(f32::MIN, f32::max);
        max_x(b).total_cmp(&max_x(a))
    });

    for (k, hole) in holes.iter().enumerate() {
        let pending: Vec<&Vec<usize>> = holes[k + 1..].iter().collect();
        polygon = bridge_hole(&vertices, polygon, hole, &pending);
    }

    let triangles = ear_clip(&vertices, polygon);
    (vertices, triangles)
}


fn bridge_hole(vertices: &[Vec2], polygon: Vec<usize>, hole: &[usize], pending: &[&Vec<usize>]) -> Vec<usize> {
    let (h_pos, &h) = match hole
        .iter()
        .enumerate()
        .max_by(|a, b| vertices[*a.1].x.total_cmp(&vertices[*b.1].x))
    {
        Some(found) => found,
        None => return polygon,
    };
    let hp = vertices[h];

    let edges_of = |ring: &[usize]| -> Vec<(Vec2, Vec2)> {
        (0..ring.len())
            .map(|i| (vertices[ring[i]], vertices[ring[(i + 1) % ring.len()]]))
            .collect()
    };
    let mut edges = edges_of(polygon.as_slice());
    edges.extend(edges_of(hole));
    for other in pending {
        edges.extend(edges_of(other.as_slice()));
    }

    let mut candidates: Vec<usize> = (0..polygon.len()).collect();
    candidates.sort_by(|&a, &b| {
        let da = (vertices[polygon[a]] - hp).magnitude2();
        let db = (vertices[polygon[b]] - hp).magnitude2();
        da.total_cmp(&db)
    });
    let visible = candidates
        .into_iter()
        .find(|&c| {
            let vp = vertices[polygon[c]];
            !edges.iter().any(|&(a, b)| segments_cross(hp, vp, a, b))
        })
        .unwrap_or(0);

    let mut merged = Vec::with_capacity(polygon.len() + hole.len() + 2);
    merged.extend_from_slice(&polygon[..=visible]);
    for i in 0..=hole.len() {
        merged.push(hole[(h_pos + i) % hole.len()]);
    }
    merged.push(polygon[visible]);
    merged.extend_from_slice(&polygon[visible + 1..]);
    merged
}


fn ear_clip(vertices: &[Vec2], mut polygon: Vec<usize>) -> Vec<[u32; 3]> {
    let mut triangles = Vec::with_capacity(polygon.len().saturating_sub(2));

    while polygon.len() > 3 {
        let n = polygon.len();
        let mut clipped = false;
        for i in 0..n {
            let (ip, ic, inx) = (polygon[(i + n - 1) % n], polygon[i], polygon[(i + 1) % n]);
            let (a, b, c) = (vertices[ip], vertices[ic], vertices[inx]);
            if cross(a, b, c) <= EPSILON {
                continue;
            }
            let blocked = polygon.iter().any(|&j| {
                let p = vertices[j];
                !(same(p, a) || same(p, b) || same(p, c)) && point_in_triangle(p, a, b, c)
            });
            if blocked {
                continue;
            }
            triangles.push([ip as u32, ic as u32, inx as u32]);
            polygon.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            // degenerate remainder: drop a collinear vertex, or force an ear
            let n = polygon.len();
            let flat = (0..n).find(|&i| {
                let (a, b, c) = (
                    vertices[polygon[(i + n - 1) % n]],
                    vertices[polygon[i]],
                    vertices[polygon[(i + 1) % n]],
                );
                cross(a, b, c).abs() <= EPSILON
            });
            match flat {
                Some(i) => {
                    polygon.remove(i);
                }
                None => {
                    triangles.push([polygon[n - 1] as u32, polygon[0] as u32, polygon[1] as u32]);
                    polygon.remove(0);
                }
            }
        }
    }
    if polygon.len() == 3 {
        let (a, b, c) = (vertices[polygon[0]], vertices[polygon[1]], vertices[polygon[2]]);
        if cross(a, b, c).abs() > EPSILON {
            triangles.push([polygon[0] as u32, polygon[1] as u32, polygon[2] as u32]);
        }
    }
    triangles
}


#[cfg(test)]
mod tests {
    use super::*;
    use three_d::vec2;

    fn square(min: f32, max: f32) -> Vec<Vec2> {
        vec![vec2(min, min), vec2(max, min), vec2(max, max), vec2(min, max)]
    }

    fn triangulated_area(vertices: &[Vec2], triangles: &[[u32; 3]]) -> f32 {
        triangles
            .iter()
            .map(|t| 0.5 * cross(vertices[t[0] as usize], vertices[t[1] as usize], vertices[t[2] as usize]))
            .sum()
    }

    #[test]
    fn square_becomes_two_triangles() {
        let shape = Shape { outer: square(0.0, 1.0), holes: vec![] };
        let (vertices, triangles) = triangulate(&shape);
        assert_eq!(triangles.len(), 2);
        assert!((triangulated_area(&vertices, &triangles) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn clockwise_input_is_reoriented() {
        let mut outer = square(0.0, 2.0);
        outer.reverse();
        let (vertices, triangles) = triangulate(&Shape { outer, holes: vec![] });
        let area = triangulated_area(&vertices, &triangles);
        assert!((area - 4.0).abs() < 1e-5, "area {}", area);
    }

    #[test]
    fn concave_polygon_keeps_its_area() {
        // L shape
        let outer = vec![
            vec2(0.0, 0.0),
            vec2(2.0, 0.0),
            vec2(2.0, 1.0),
            vec2(1.0, 1.0),
            vec2(1.0, 2.0),
            vec2(0.0, 2.0),
        ];
        let (vertices, triangles) = triangulate(&Shape { outer, holes: vec![] });
        assert_eq!(triangles.len(), 4);
        assert!((triangulated_area(&vertices, &triangles) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn holes_are_subtracted() {
        let shape = Shape {
            outer: square(0.0, 4.0),
            holes: vec![square(1.0, 3.0)],
        };
        let (vertices, triangles) = triangulate(&shape);
        assert!((triangulated_area(&vertices, &triangles) - 12.0).abs() < 1e-4);
        for t in &triangles {
            let a = vertices[t[0] as usize];
            let b = vertices[t[1] as usize];
            let c = vertices[t[2] as usize];
            if cross(a, b, c).abs() < 1e-6 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(!point_in_polygon(centroid, &square(1.0, 3.0)));
        }
    }

    #[test]
    fn two_holes_are_subtracted() {
        let shape = Shape {
            outer: vec![vec2(0.0, 0.0), vec2(6.0, 0.0), vec2(6.0, 3.0), vec2(0.0, 3.0)],
            holes: vec![square(1.0, 2.0), vec![vec2(4.0, 1.0), vec2(5.0, 1.0), vec2(5.0, 2.0), vec2(4.0, 2.0)]],
        };
        let (vertices, triangles) = triangulate(&shape);
        assert!((triangulated_area(&vertices, &triangles) - 16.0).abs() < 1e-4);
    }

    #[test]
    fn nested_contours_become_outer_and_hole() {
        let mut inner = square(1.0, 3.0);
        inner.push(inner[0]);
        let shapes = shapes_from_contours(vec![square(0.0, 4.0), inner, square(10.0, 11.0)]);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].holes.len(), 1);
        assert_eq!(shapes[0].holes[0].len(), 4);
        assert!(signed_area(&shapes[0].outer) > 0.0);
        assert!(signed_area(&shapes[0].holes[0]) < 0.0);
        assert!(shapes[1].holes.is_empty());
    }

    #[test]
    fn island_inside_hole_is_its_own_shape() {
        let shapes = shapes_from_contours(vec![square(0.0, 10.0), square(2.0, 8.0), square(4.0, 6.0)]);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes.iter().map(|s| s.holes.len()).sum::<usize>(), 1);
    }

    #[test]
    fn degenerate_contours_are_dropped() {
        let line = vec![vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(2.0, 0.0)];
        assert!(shapes_from_contours(vec![line, vec![vec2(0.0, 0.0)]]).is_empty());
    }
}
