//! Scattered samples → dense grid field.
//!
//! The engine is strict: fewer than three distinct locations or a geometry
//! the chosen method cannot handle is an error, never a plausible-looking
//! field. Only cells outside the sampled hull are filled, and only when the
//! edge policy asks for it.

use crate::dataset::{MIN_DISTINCT_POINTS, Metric, ScatteredMetricDataset, point_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub mod cubic;
pub mod delaunay;
pub mod linear;
pub mod nearest;

use cubic::CubicInterpolator;
use delaunay::Triangulation;
use linear::LinearInterpolator;
use nearest::NearestNeighbour;

/// Upper bound per axis, keeps request-driven grids from exhausting memory.
pub const MAX_RESOLUTION: usize = 2000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("need at least {required} distinct sample locations, got {distinct}")]
    InsufficientData { distinct: usize, required: usize },
    #[error("numeric failure: {0}")]
    NumericFailure(String),
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Nearest,
    #[default]
    Linear,
    Cubic,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Nearest => "nearest",
            Method::Linear => "linear",
            Method::Cubic => "cubic",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown interpolation method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Method::Nearest),
            "linear" => Ok(Method::Linear),
            "cubic" => Ok(Method::Cubic),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// What happens to cells the chosen method leaves undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Second pass with nearest-neighbour values.
    #[default]
    NearestFill,
    LeaveUndefined,
}

impl EdgePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgePolicy::NearestFill => "nearest_fill",
            EdgePolicy::LeaveUndefined => "leave_undefined",
        }
    }
}

impl FromStr for EdgePolicy {
    type Err = UnknownEdgePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "nearest_fill" | "fill" => Ok(EdgePolicy::NearestFill),
            "leave_undefined" | "none" => Ok(EdgePolicy::LeaveUndefined),
            _ => Err(UnknownEdgePolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown edge policy `{0}`")]
pub struct UnknownEdgePolicy(pub String);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// Data bounding box grown by `margin` times each span (span floored at 1).
    Auto { margin: f64 },
    Explicit(Bounds),
}

impl Default for Region {
    fn default() -> Self {
        Region::Auto {
            margin: crate::config::DEFAULT_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Region {
    pub fn resolve(&self, points: &[(f64, f64)]) -> Result<Bounds, InterpolationError> {
        match *self {
            Region::Explicit(bounds) => {
                let finite = [bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y]
                    .iter()
                    .all(|v| v.is_finite());
                if !finite || bounds.min_x >= bounds.max_x || bounds.min_y >= bounds.max_y {
                    return Err(InterpolationError::InvalidGrid(format!(
                        "region must be finite and non-empty, got {bounds:?}"
                    )));
                }
                Ok(bounds)
            }
            Region::Auto { margin } => {
                if !margin.is_finite() || margin < 0.0 {
                    return Err(InterpolationError::InvalidGrid(format!(
                        "margin must be a non-negative number, got {margin}"
                    )));
                }
                let (first, rest) = points.split_first().ok_or_else(|| {
                    InterpolationError::InsufficientData {
                        distinct: 0,
                        required: MIN_DISTINCT_POINTS,
                    }
                })?;
                let mut bounds = Bounds {
                    min_x: first.0,
                    max_x: first.0,
                    min_y: first.1,
                    max_y: first.1,
                };
                for &(x, y) in rest {
                    bounds.min_x = bounds.min_x.min(x);
                    bounds.max_x = bounds.max_x.max(x);
                    bounds.min_y = bounds.min_y.min(y);
                    bounds.max_y = bounds.max_y.max(y);
                }
                let pad_x = (bounds.max_x - bounds.min_x).max(1.0) * margin;
                let pad_y = (bounds.max_y - bounds.min_y).max(1.0) * margin;
                Ok(Bounds {
                    min_x: bounds.min_x - pad_x,
                    max_x: bounds.max_x + pad_x,
                    min_y: bounds.min_y - pad_y,
                    max_y: bounds.max_y + pad_y,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    /// Number of columns.
    pub resolution_x: usize,
    /// Number of rows.
    pub resolution_y: usize,
    pub method: Method,
    pub edge_policy: EdgePolicy,
    pub region: Region,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            resolution_x: crate::config::DEFAULT_RESOLUTION,
            resolution_y: crate::config::DEFAULT_RESOLUTION,
            method: Method::default(),
            edge_policy: EdgePolicy::default(),
            region: Region::default(),
        }
    }
}

impl GridSpec {
    fn validate(&self) -> Result<(), InterpolationError> {
        let valid = |n: usize| (2..=MAX_RESOLUTION).contains(&n);
        if !valid(self.resolution_x) || !valid(self.resolution_y) {
            return Err(InterpolationError::InvalidGrid(format!(
                "resolution must be between 2 and {MAX_RESOLUTION} per axis, got {}x{}",
                self.resolution_x, self.resolution_y
            )));
        }
        Ok(())
    }
}

/// Interpolated grid. `values[row][col]` is the value at `(grid_x[col], grid_y[row])`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenseField {
    pub metric: Metric,
    pub method: Method,
    pub edge_policy: EdgePolicy,
    pub region: Bounds,
    pub grid_x: Vec<f64>,
    pub grid_y: Vec<f64>,
    pub values: Vec<Vec<Option<f64>>>,
    pub sample_count: usize,
    /// Cells that came from the nearest-neighbour edge pass.
    pub filled_cells: usize,
}

impl DenseField {
    pub fn undefined_cells(&self) -> usize {
        self.values
            .iter()
            .flatten()
            .filter(|value| value.is_none())
            .count()
    }

    /// Smallest and largest defined value.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .flatten()
            .flatten()
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// `n` evenly spaced positions from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Collapse samples sharing a location into one, averaging their values.
///
/// Output keeps first-occurrence order.
pub fn merge_coincident(points: &[(f64, f64)], values: &[f64]) -> (Vec<(f64, f64)>, Vec<f64>) {
    let mut slots: BTreeMap<(u64, u64), usize> = BTreeMap::new();
    let mut merged_points = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();

    for (&point, &value) in points.iter().zip(values) {
        let slot = *slots.entry(point_key(point)).or_insert_with(|| {
            merged_points.push(point);
            sums.push(0.0);
            counts.push(0);
            merged_points.len() - 1
        });
        sums[slot] += value;
        counts[slot] += 1;
    }

    let merged_values = sums
        .iter()
        .zip(&counts)
        .map(|(sum, count)| sum / *count as f64)
        .collect();
    (merged_points, merged_values)
}

/// Samples reordered by location, then value, so triangulation sees the same
/// vertex order however the records arrived.
pub fn canonical_order(points: &[(f64, f64)], values: &[f64]) -> (Vec<(f64, f64)>, Vec<f64>) {
    let mut samples: Vec<((f64, f64), f64)> = points
        .iter()
        .map(|&(x, y)| (x + 0.0, y + 0.0))
        .zip(values.iter().copied())
        .collect();
    samples.sort_by(|((ax, ay), av), ((bx, by), bv)| {
        ax.total_cmp(bx)
            .then_with(|| ay.total_cmp(by))
            .then_with(|| av.total_cmp(bv))
    });
    samples.into_iter().unzip()
}

/// Interpolate `dataset` onto the grid described by `spec`.
pub fn interpolate(
    dataset: &ScatteredMetricDataset,
    spec: &GridSpec,
) -> Result<DenseField, InterpolationError> {
    spec.validate()?;

    let distinct = dataset.distinct_point_count();
    if distinct < MIN_DISTINCT_POINTS {
        return Err(InterpolationError::InsufficientData {
            distinct,
            required: MIN_DISTINCT_POINTS,
        });
    }

    let region = spec.region.resolve(dataset.points())?;
    let grid_x = linspace(region.min_x, region.max_x, spec.resolution_x);
    let grid_y = linspace(region.min_y, region.max_y, spec.resolution_y);
    let nearest = NearestNeighbour::new(dataset.points(), dataset.values());

    let mut values = match spec.method {
        Method::Nearest => evaluate(&grid_x, &grid_y, |x, y| nearest.value_at(x, y)),
        Method::Linear | Method::Cubic => {
            let (sorted_points, sorted_values) =
                canonical_order(dataset.points(), dataset.values());
            let (points, merged) = merge_coincident(&sorted_points, &sorted_values);
            let triangulation = Triangulation::new(&points)?;
            debug!(
                vertices = points.len(),
                triangles = triangulation.triangles().len(),
                "Triangulated samples"
            );
            if spec.method == Method::Linear {
                let linear = LinearInterpolator::new(&triangulation, &merged);
                evaluate(&grid_x, &grid_y, |x, y| linear.value_at(x, y))
            } else {
                let cubic = CubicInterpolator::new(&triangulation, &merged)?;
                evaluate(&grid_x, &grid_y, |x, y| cubic.value_at(x, y))
            }
        }
    };

    if values.iter().flatten().flatten().any(|v| !v.is_finite()) {
        return Err(InterpolationError::NumericFailure(format!(
            "{} interpolation produced non-finite values",
            spec.method
        )));
    }

    let mut filled_cells = 0;
    if spec.edge_policy == EdgePolicy::NearestFill {
        for (row, &y) in values.iter_mut().zip(&grid_y) {
            for (cell, &x) in row.iter_mut().zip(&grid_x) {
                if cell.is_none() {
                    *cell = nearest.value_at(x, y);
                    filled_cells += 1;
                }
            }
        }
    }

    info!(
        metric = %dataset.metric(),
        method = %spec.method,
        samples = dataset.len(),
        distinct,
        columns = spec.resolution_x,
        rows = spec.resolution_y,
        filled_cells,
        "Field interpolated"
    );

    Ok(DenseField {
        metric: dataset.metric(),
        method: spec.method,
        edge_policy: spec.edge_policy,
        region,
        grid_x,
        grid_y,
        values,
        sample_count: dataset.len(),
        filled_cells,
    })
}

fn evaluate<F>(grid_x: &[f64], grid_y: &[f64], value_at: F) -> Vec<Vec<Option<f64>>>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    grid_y
        .iter()
        .map(|&y| grid_x.iter().map(|&x| value_at(x, y)).collect())
        .collect()
}
