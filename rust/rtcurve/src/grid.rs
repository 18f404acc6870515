use crate::{
    CurveError,
    Point,
};
use tracing::trace;

/// Square accumulation grid over a fixed x/y box.
///
/// Cell weights are stored row-major (`row = y bin`, `col = x bin`).
pub struct Grid {
    pub(crate) weights: Vec<f64>,
    pub(crate) x_range: (f64, f64),
    pub(crate) y_range: (f64, f64),
    pub(crate) bins: usize,
}

impl Grid {
    pub fn new(bins: usize, x_range: (f64, f64), y_range: (f64, f64)) -> Result<Self, CurveError> {
        if bins == 0 {
            return Err(CurveError::ZeroRange);
        };
        let x_span = x_range.1 - x_range.0;
        let y_span = y_range.1 - y_range.0;
        if !(x_span > 0.0 && y_span > 0.0) {
            return Err(CurveError::ZeroRange);
        }

        Ok(Self {
            weights: vec![0.0; bins * bins],
            x_range,
            y_range,
            bins,
        })
    }

    fn bin_of(&self, value: f64, range: (f64, f64)) -> usize {
        let frac = (value - range.0) / (range.1 - range.0);
        // Float to int casts saturate, so values below the range land in bin 0.
        ((frac * self.bins as f64) as usize).min(self.bins - 1)
    }

    /// Center of the cell at `(row, col)`, carrying the accumulated weight.
    pub fn cell_center(&self, row: usize, col: usize) -> Point {
        let x_step = (self.x_range.1 - self.x_range.0) / self.bins as f64;
        let y_step = (self.y_range.1 - self.y_range.0) / self.bins as f64;
        Point {
            x: self.x_range.0 + (col as f64 + 0.5) * x_step,
            y: self.y_range.0 + (row as f64 + 0.5) * y_step,
            weight: self.weights[row * self.bins + col],
        }
    }

    pub fn extend_points<'a, T>(&mut self, points: T) -> Result<(), CurveError>
    where
        T: IntoIterator<Item = &'a Point> + 'a,
    {
        points.into_iter().try_for_each(|p| self.add_point(p))
    }

    pub fn add_point(&mut self, point: &Point) -> Result<(), CurveError> {
        if !point.weight.is_finite() {
            return Err(CurveError::UnsupportedWeight(point.weight));
        }
        let col = self.bin_of(point.x, self.x_range);
        let row = self.bin_of(point.y, self.y_range);
        self.weights[row * self.bins + col] += point.weight;
        Ok(())
    }

    /// Non-maximum suppression.
    ///
    /// Returns the centers of the cells holding a positive weight that is the
    /// maximum of both their row and their column. Ties are all retained.
    pub fn retained_nodes(&self) -> Result<Vec<Point>, CurveError> {
        let mut max_in_row = vec![0.0f64; self.bins];
        let mut max_in_col = vec![0.0f64; self.bins];
        for (index, w) in self.weights.iter().enumerate() {
            let (r, c) = (index / self.bins, index % self.bins);
            max_in_row[r] = max_in_row[r].max(*w);
            max_in_col[c] = max_in_col[c].max(*w);
        }

        let mut retained = Vec::new();
        let mut suppressed_weight = 0.0;
        for (index, w) in self.weights.iter().enumerate() {
            let (r, c) = (index / self.bins, index % self.bins);
            if *w > 0.0 && *w == max_in_row[r] && *w == max_in_col[c] {
                retained.push(self.cell_center(r, c));
            } else {
                suppressed_weight += w;
            }
        }

        trace!(
            "Suppressed weight {}, retained {} cells",
            suppressed_weight,
            retained.len()
        );
        if retained.is_empty() {
            return Err(CurveError::NoPoints);
        }
        Ok(retained)
    }
}
