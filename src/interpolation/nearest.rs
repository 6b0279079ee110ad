/// Value of the closest sample; the earlier sample wins a distance tie.
#[derive(Debug, Clone, Copy)]
pub struct NearestNeighbour<'a> {
    points: &'a [(f64, f64)],
    values: &'a [f64],
}

impl<'a> NearestNeighbour<'a> {
    pub fn new(points: &'a [(f64, f64)], values: &'a [f64]) -> Self {
        Self { points, values }
    }

    /// `None` only when there are no samples.
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let mut best: Option<(f64, usize)> = None;
        for (index, &(px, py)) in self.points.iter().enumerate() {
            let distance = (px - x) * (px - x) + (py - y) * (py - y);
            if best.is_none_or(|(closest, _)| distance < closest) {
                best = Some((distance, index));
            }
        }
        best.and_then(|(_, index)| self.values.get(index).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_sample_wins() {
        let points = [(0.0, 0.0), (10.0, 0.0)];
        let values = [1.0, 2.0];
        let nearest = NearestNeighbour::new(&points, &values);

        assert_eq!(nearest.value_at(2.0, 3.0), Some(1.0));
        assert_eq!(nearest.value_at(9.0, -4.0), Some(2.0));
    }

    #[test]
    fn tie_goes_to_earlier_sample() {
        let points = [(10.0, 0.0), (0.0, 0.0)];
        let values = [7.0, 3.0];
        let nearest = NearestNeighbour::new(&points, &values);

        assert_eq!(nearest.value_at(5.0, 0.0), Some(7.0));
    }

    #[test]
    fn duplicates_keep_first_value() {
        let points = [(1.0, 1.0), (1.0, 1.0)];
        let values = [-40.0, -60.0];

        assert_eq!(NearestNeighbour::new(&points, &values).value_at(1.0, 1.0), Some(-40.0));
    }

    #[test]
    fn no_samples_no_value() {
        assert_eq!(NearestNeighbour::new(&[], &[]).value_at(0.0, 0.0), None);
    }
}
