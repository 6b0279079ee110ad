use super::delaunay::Triangulation;

/// Piecewise-linear interpolation over a triangulation; undefined outside its hull.
#[derive(Debug, Clone, Copy)]
pub struct LinearInterpolator<'a> {
    triangulation: &'a Triangulation,
    values: &'a [f64],
}

impl<'a> LinearInterpolator<'a> {
    /// `values` is indexed like the triangulation's points.
    pub fn new(triangulation: &'a Triangulation, values: &'a [f64]) -> Self {
        Self {
            triangulation,
            values,
        }
    }

    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let (index, weights) = self.triangulation.locate(x, y)?;
        let tri = self.triangulation.triangles()[index];
        Some(
            tri.iter()
                .zip(weights)
                .map(|(&vertex, weight)| weight * self.values[vertex])
                .sum(),
        )
    }
}
