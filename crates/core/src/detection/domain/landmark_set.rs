//! Dense 2D face landmarks in pixel space.

#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: Vec<(f64, f64)>,
}

impl LandmarkSet {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Scales points from normalized `[0, 1]` image coordinates to pixels.
    pub fn from_normalized(points: &[(f64, f64)], width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            points: points.iter().map(|&(x, y)| (x * w, y * h)).collect(),
        }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`, or `None` when
    /// there are no points.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold(
            (first.0, first.1, first.0, first.1),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_normalized_scales_by_frame_size() {
        let set = LandmarkSet::from_normalized(&[(0.0, 0.0), (0.5, 0.25), (1.0, 1.0)], 640, 480);
        assert_eq!(set.len(), 3);
        assert_relative_eq!(set.points()[1].0, 320.0);
        assert_relative_eq!(set.points()[1].1, 120.0);
        assert_relative_eq!(set.points()[2].0, 640.0);
        assert_relative_eq!(set.points()[2].1, 480.0);
    }

    #[test]
    fn test_bounds() {
        let set = LandmarkSet::new(vec![(10.0, 40.0), (30.0, 5.0), (20.0, 20.0)]);
        assert_eq!(set.bounds(), Some((10.0, 5.0, 30.0, 40.0)));
    }

    #[test]
    fn test_empty_has_no_bounds() {
        let set = LandmarkSet::new(Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.bounds(), None);
    }
}
