//! Incremental Bowyer–Watson Delaunay triangulation.
//!
//! Points are inserted in input order into a large enclosing triangle whose
//! corners are dropped at the end. Construction runs in coordinates
//! normalized to roughly `[-1, 1]`, so the predicates see well-scaled input
//! regardless of the measurement unit.

use super::InterpolationError;
use std::collections::BTreeMap;

/// Half-width of the enclosing triangle in normalized coordinates. Its corners
/// must stay outside the circumcircle of every thin but valid sample triangle.
const SUPER_TRIANGLE_SCALE: f64 = 1.0e6;
/// Twice-area below which a triangle counts as degenerate (normalized units).
const DEGENERATE_AREA: f64 = 1e-12;
/// Barycentric slack when locating grid cells on triangle edges.
const LOCATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<(f64, f64)>,
    /// Vertex indices, counter-clockwise.
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    /// Triangulate distinct `points`.
    ///
    /// Fails when the points span no area, e.g. all on one line.
    pub fn new(points: &[(f64, f64)]) -> Result<Self, InterpolationError> {
        if points.len() < 3 {
            return Err(InterpolationError::NumericFailure(format!(
                "triangulation needs at least 3 points, got {}",
                points.len()
            )));
        }

        let mut vertices = normalize(points);
        let n = vertices.len();
        vertices.push((-SUPER_TRIANGLE_SCALE, -SUPER_TRIANGLE_SCALE));
        vertices.push((SUPER_TRIANGLE_SCALE, -SUPER_TRIANGLE_SCALE));
        vertices.push((0.0, SUPER_TRIANGLE_SCALE));

        let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

        for p in 0..n {
            let point = vertices[p];
            let mut bad: Vec<usize> = triangles
                .iter()
                .enumerate()
                .filter(|(_, tri)| in_circumcircle(&vertices, tri, point))
                .map(|(index, _)| index)
                .collect();

            if bad.is_empty() {
                // Rounding can leave a point on no circumcircle; fall back to
                // the triangle that contains it.
                let containing = triangles
                    .iter()
                    .position(|tri| contains(&vertices, tri, point))
                    .ok_or_else(|| {
                        InterpolationError::NumericFailure(format!(
                            "could not insert sample {p} into the triangulation"
                        ))
                    })?;
                bad.push(containing);
            }

            // Cavity boundary: edges that belong to exactly one bad triangle.
            let mut edges: BTreeMap<(usize, usize), ((usize, usize), usize)> = BTreeMap::new();
            for &index in &bad {
                let [a, b, c] = triangles[index];
                for (from, to) in [(a, b), (b, c), (c, a)] {
                    let key = (from.min(to), from.max(to));
                    edges.entry(key).or_insert(((from, to), 0)).1 += 1;
                }
            }

            bad.sort_unstable();
            for index in bad.into_iter().rev() {
                triangles.swap_remove(index);
            }

            for ((from, to), count) in edges.into_values() {
                if count != 1 {
                    continue;
                }
                let mut tri = [from, to, p];
                if orient(vertices[from], vertices[to], point) < 0.0 {
                    tri.swap(0, 1);
                }
                triangles.push(tri);
            }
        }

        triangles.retain(|tri| {
            tri.iter().all(|&v| v < n)
                && orient(vertices[tri[0]], vertices[tri[1]], vertices[tri[2]]) > DEGENERATE_AREA
        });

        if triangles.is_empty() {
            return Err(InterpolationError::NumericFailure(
                "samples are collinear; no triangle spans them".to_string(),
            ));
        }

        Ok(Self {
            points: points.to_vec(),
            triangles,
        })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// First triangle containing `(x, y)` and the barycentric weights of its vertices.
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, [f64; 3])> {
        self.triangles.iter().enumerate().find_map(|(index, tri)| {
            let weights = barycentric(
                self.points[tri[0]],
                self.points[tri[1]],
                self.points[tri[2]],
                (x, y),
            )?;
            weights
                .iter()
                .all(|&w| w >= -LOCATE_EPSILON)
                .then_some((index, weights))
        })
    }

    /// Sorted neighbour list of every vertex.
    pub fn neighbours(&self) -> Vec<Vec<usize>> {
        let mut neighbours = vec![Vec::new(); self.points.len()];
        for &[a, b, c] in &self.triangles {
            for (v, others) in [(a, [b, c]), (b, [a, c]), (c, [a, b])] {
                neighbours[v].extend_from_slice(&others);
            }
        }
        for list in &mut neighbours {
            list.sort_unstable();
            list.dedup();
        }
        neighbours
    }
}

/// Shift to the bounding-box centre and scale the larger half-span to 1.
fn normalize(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    let cx = (min_x + max_x) / 2.0;
    let cy = (min_y + max_y) / 2.0;
    let half_span = ((max_x - min_x).max(max_y - min_y) / 2.0).max(f64::MIN_POSITIVE);

    points
        .iter()
        .map(|&(x, y)| ((x - cx) / half_span, (y - cy) / half_span))
        .collect()
}

/// Twice the signed area of `abc`; positive when counter-clockwise.
fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// True when `d` lies strictly inside the circumcircle of counter-clockwise `tri`.
fn in_circumcircle(vertices: &[(f64, f64)], tri: &[usize; 3], d: (f64, f64)) -> bool {
    let (a, b, c) = (vertices[tri[0]], vertices[tri[1]], vertices[tri[2]]);
    let (adx, ady) = (a.0 - d.0, a.1 - d.1);
    let (bdx, bdy) = (b.0 - d.0, b.1 - d.1);
    let (cdx, cdy) = (c.0 - d.0, c.1 - d.1);

    let det = (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
        - (bdx * bdx + bdy * bdy) * (adx * cdy - cdx * ady)
        + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady);
    det > 0.0
}

fn contains(vertices: &[(f64, f64)], tri: &[usize; 3], p: (f64, f64)) -> bool {
    barycentric(vertices[tri[0]], vertices[tri[1]], vertices[tri[2]], p)
        .is_some_and(|weights| weights.iter().all(|&w| w >= -LOCATE_EPSILON))
}

/// Barycentric weights of `p` in `abc`, `None` for a degenerate triangle.
pub(crate) fn barycentric(
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
    p: (f64, f64),
) -> Option<[f64; 3]> {
    let det = (b.1 - c.1) * (a.0 - c.0) + (c.0 - b.0) * (a.1 - c.1);
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let wa = ((b.1 - c.1) * (p.0 - c.0) + (c.0 - b.0) * (p.1 - c.1)) / det;
    let wb = ((c.1 - a.1) * (p.0 - c.0) + (a.0 - c.0) * (p.1 - c.1)) / det;
    Some([wa, wb, 1.0 - wa - wb])
}
