//! Piecewise-cubic interpolation on a triangulation.
//!
//! Each triangle carries a cubic Bézier patch built from the vertex values
//! and gradients estimated by inverse-distance-weighted least squares over
//! the vertex's Delaunay neighbours. Patches agree along shared edges, so
//! the surface is continuous; it can overshoot the sample range.

use super::InterpolationError;
use super::delaunay::Triangulation;

/// Relative determinant below which a gradient system counts as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
struct BezierPatch {
    b300: f64,
    b030: f64,
    b003: f64,
    b210: f64,
    b120: f64,
    b201: f64,
    b102: f64,
    b021: f64,
    b012: f64,
    b111: f64,
}

impl BezierPatch {
    fn evaluate(&self, [u, v, w]: [f64; 3]) -> f64 {
        u * u * u * self.b300
            + v * v * v * self.b030
            + w * w * w * self.b003
            + 3.0 * u * u * v * self.b210
            + 3.0 * u * v * v * self.b120
            + 3.0 * u * u * w * self.b201
            + 3.0 * u * w * w * self.b102
            + 3.0 * v * v * w * self.b021
            + 3.0 * v * w * w * self.b012
            + 6.0 * u * v * w * self.b111
    }
}

#[derive(Debug, Clone)]
pub struct CubicInterpolator<'a> {
    triangulation: &'a Triangulation,
    patches: Vec<BezierPatch>,
}

impl<'a> CubicInterpolator<'a> {
    /// `values` is indexed like the triangulation's points.
    pub fn new(
        triangulation: &'a Triangulation,
        values: &[f64],
    ) -> Result<Self, InterpolationError> {
        let gradients = estimate_gradients(triangulation, values)?;
        let points = triangulation.points();

        let patches = triangulation
            .triangles()
            .iter()
            .map(|&[i, j, k]| {
                // control point one third along edge a→b, seen from a
                let edge = |a: usize, b: usize| {
                    let (gx, gy) = gradients[a];
                    let dx = points[b].0 - points[a].0;
                    let dy = points[b].1 - points[a].1;
                    values[a] + (gx * dx + gy * dy) / 3.0
                };

                let b210 = edge(i, j);
                let b201 = edge(i, k);
                let b120 = edge(j, i);
                let b021 = edge(j, k);
                let b102 = edge(k, i);
                let b012 = edge(k, j);

                let edge_mean = (b210 + b201 + b120 + b021 + b102 + b012) / 6.0;
                let vertex_mean = (values[i] + values[j] + values[k]) / 3.0;

                BezierPatch {
                    b300: values[i],
                    b030: values[j],
                    b003: values[k],
                    b210,
                    b120,
                    b201,
                    b102,
                    b021,
                    b012,
                    b111: edge_mean + (edge_mean - vertex_mean) / 2.0,
                }
            })
            .collect();

        Ok(Self {
            triangulation,
            patches,
        })
    }

    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let (index, weights) = self.triangulation.locate(x, y)?;
        Some(self.patches[index].evaluate(weights))
    }
}

/// Gradient at every vertex minimizing Σ w·(fⱼ − fᵢ − g·dⱼ)² with w = 1/|dⱼ|².
pub fn estimate_gradients(
    triangulation: &Triangulation,
    values: &[f64],
) -> Result<Vec<(f64, f64)>, InterpolationError> {
    let points = triangulation.points();
    let neighbours = triangulation.neighbours();
    let mut gradients = Vec::with_capacity(points.len());

    for (vertex, around) in neighbours.iter().enumerate() {
        let (px, py) = points[vertex];
        let (mut sxx, mut sxy, mut syy, mut bx, mut by) = (0.0, 0.0, 0.0, 0.0, 0.0);

        for &other in around {
            let dx = points[other].0 - px;
            let dy = points[other].1 - py;
            let weight = 1.0 / (dx * dx + dy * dy);
            let df = values[other] - values[vertex];
            sxx += weight * dx * dx;
            sxy += weight * dx * dy;
            syy += weight * dy * dy;
            bx += weight * dx * df;
            by += weight * dy * df;
        }

        let det = sxx * syy - sxy * sxy;
        let scale = (sxx + syy) * (sxx + syy);
        if around.len() < 2 || !det.is_finite() || det.abs() <= SINGULAR_TOLERANCE * scale {
            return Err(InterpolationError::NumericFailure(format!(
                "gradient at sample ({px}, {py}) is undetermined by its neighbours"
            )));
        }

        gradients.push(((syy * bx - sxy * by) / det, (sxx * by - sxy * bx) / det));
    }

    Ok(gradients)
}
