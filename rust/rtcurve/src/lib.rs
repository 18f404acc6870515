//! Monotonic retention-time calibration curves.
//!
//! A curve is fit from paired `(sample_rt, reference_rt)` observations in three steps:
//! the points are binned on a square grid and only cells that dominate both their row
//! and their column survive, the heaviest strictly ascending path through the
//! survivors is kept, and that path (pinned to fixed end points and lightly
//! smoothed) becomes the knots of a piecewise linear function.

pub mod grid;
mod pathfinding;
pub mod plotting;
pub use grid::Grid;
use tracing::{
    debug,
    warn,
};

/// Minimum denominator for slope calculations to avoid division by zero.
const MIN_SLOPE_DENOMINATOR: f64 = 1e-9;

const CURVE_PLOT_WIDTH: usize = 40;
const CURVE_PLOT_HEIGHT: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum CurveError {
    /// No usable input points were provided.
    NoPoints,
    /// Fewer than two knots are left to interpolate between.
    InsufficientPoints,
    /// The grid was requested with zero bins or a degenerate range.
    ZeroRange,
    /// The value was outside the fitted range. Carries the linearly extrapolated prediction.
    OutOfBounds(f64),
    /// A point weight was NaN or infinite.
    UnsupportedWeight(f64),
}

impl std::fmt::Display for CurveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurveError::NoPoints => write!(f, "no points available to fit a curve"),
            CurveError::InsufficientPoints => write!(f, "at least two knots are needed"),
            CurveError::ZeroRange => write!(f, "grid range has zero width or height"),
            CurveError::OutOfBounds(y) => {
                write!(f, "value outside the fitted range (extrapolated to {})", y)
            }
            CurveError::UnsupportedWeight(w) => write!(f, "unsupported point weight {}", w),
        }
    }
}

impl std::error::Error for CurveError {}

/// A weighted observation on the sample-time / reference-time plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, weight: 1.0 }
    }
}

/// Piecewise linear curve through strictly ascending knots.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RtCurve {
    knots: Vec<Point>,
    slopes: Vec<f64>,
}

impl RtCurve {
    /// Builds a curve from knots, sorting them by `x`.
    /// Knots sharing an `x` value keep only the first occurrence.
    pub fn new(mut knots: Vec<Point>) -> Result<Self, CurveError> {
        knots.retain(|p| p.x.is_finite() && p.y.is_finite());
        if knots.is_empty() {
            return Err(CurveError::NoPoints);
        }
        knots.sort_by(|a, b| a.x.total_cmp(&b.x));
        knots.dedup_by(|b, a| (b.x - a.x).abs() < MIN_SLOPE_DENOMINATOR);
        if knots.len() < 2 {
            return Err(CurveError::InsufficientPoints);
        }

        let slopes = knots
            .windows(2)
            .map(|p| (p[1].y - p[0].y) / (p[1].x - p[0].x).max(MIN_SLOPE_DENOMINATOR))
            .collect();

        Ok(Self { knots, slopes })
    }

    pub fn knots(&self) -> &[Point] {
        &self.knots
    }

    /// Range of `x` covered by the knots.
    pub fn x_range(&self) -> (f64, f64) {
        // `new` guarantees at least two knots.
        (self.knots[0].x, self.knots[self.knots.len() - 1].x)
    }

    pub fn is_monotonic(&self) -> bool {
        self.slopes.iter().all(|s| *s >= 0.0)
    }

    /// Weighted root mean squared error over the in-range test points.
    pub fn wrmse<'a>(&self, test_points: impl Iterator<Item = &'a Point> + 'a) -> f64 {
        let mut total_error = 0.0;
        let mut weight: f64 = 0.0;

        for p in test_points {
            if let Ok(predicted_y) = self.predict(p.x) {
                let error = predicted_y - p.y;
                total_error += (error * error) * p.weight;
                weight += p.weight;
            }
        }

        if weight == 0.0 {
            f64::NAN
        } else {
            (total_error / weight).sqrt()
        }
    }

    /// Evaluates the curve at `x_val`.
    ///
    /// Values outside the knot range return [`CurveError::OutOfBounds`] holding the
    /// prediction extrapolated from the nearest segment, so callers can decide
    /// whether to use it.
    pub fn predict(&self, x_val: f64) -> Result<f64, CurveError> {
        let (first_x, last_x) = self.x_range();
        if x_val < first_x {
            return Err(CurveError::OutOfBounds(self.predict_with_index(x_val, 1)));
        }
        if x_val > last_x {
            return Err(CurveError::OutOfBounds(
                self.predict_with_index(x_val, self.slopes.len()),
            ));
        }

        let i = self.knots.partition_point(|p| p.x < x_val).max(1);
        Ok(self.predict_with_index(x_val, i))
    }

    /// Same as [`RtCurve::predict`] but takes the extrapolated value when out of range.
    pub fn predict_or_extrapolate(&self, x_val: f64) -> f64 {
        match self.predict(x_val) {
            Ok(y) | Err(CurveError::OutOfBounds(y)) => y,
            Err(_) => x_val,
        }
    }

    /// Linear interpolation on the segment ending at knot `i` (1 <= i <= slopes.len()).
    fn predict_with_index(&self, x_val: f64, i: usize) -> f64 {
        debug_assert!(i > 0 && i <= self.slopes.len());
        let p1 = self.knots[i - 1];
        let slope = self.slopes[i - 1];
        p1.y + (x_val - p1.x) * slope
    }
}

/// Replaces every interior knot by the mean of itself and its two neighbours.
///
/// Both coordinates are averaged, so knots on a straight line stay on it and a
/// strictly ascending sequence stays strictly ascending. End knots are untouched.
fn smooth_interior(knots: &mut [Point]) {
    if knots.len() < 3 {
        return;
    }
    let original = knots.to_vec();
    for i in 1..knots.len() - 1 {
        let (a, b, c) = (original[i - 1], original[i], original[i + 1]);
        knots[i].x = (a.x + b.x + c.x) / 3.0;
        knots[i].y = (a.y + b.y + c.y) / 3.0;
    }
}

fn ascending_knots(
    points: &[Point],
    x_range: (f64, f64),
    y_range: (f64, f64),
    grid_size: usize,
) -> Result<Vec<Point>, CurveError> {
    let mut grid = Grid::new(grid_size, x_range, y_range)?;
    grid.extend_points(points)?;
    let mut retained = grid.retained_nodes()?;
    debug!("Curve grid:\n{}", grid.format_heatmap());
    Ok(pathfinding::ascending_path(&mut retained))
}

/// Fits a curve pinned to `start` and `end`.
///
/// Only points strictly inside the box spanned by the two anchors are used. The
/// anchors always become the first and last knots, and the path in between is
/// smoothed once. Returns [`CurveError::NoPoints`] if no point falls in the box.
pub fn fit_anchored(
    points: &[Point],
    start: Point,
    end: Point,
    grid_size: usize,
) -> Result<RtCurve, CurveError> {
    let inside = |p: &Point| p.x > start.x && p.x < end.x && p.y > start.y && p.y < end.y;
    let usable: Vec<Point> = points.iter().copied().filter(inside).collect();
    if usable.is_empty() {
        warn!(
            "None of the {} points fall inside the anchored range",
            points.len()
        );
        return Err(CurveError::NoPoints);
    }

    let path = ascending_knots(&usable, (start.x, end.x), (start.y, end.y), grid_size)?;
    let mut knots = Vec::with_capacity(path.len() + 2);
    knots.push(start);
    knots.extend(path.into_iter().filter(inside));
    knots.push(end);
    smooth_interior(&mut knots);

    let curve = RtCurve::new(knots)?;
    debug!(
        "Anchored curve with {} knots, WRMSE {:.3}\n{}",
        curve.knots.len(),
        curve.wrmse(usable.iter()),
        plotting::plot_curve(&curve, CURVE_PLOT_WIDTH, CURVE_PLOT_HEIGHT)
    );
    Ok(curve)
}
