//! Plain-text renderings of grids and curves, used in debug logs.

use crate::{
    Grid,
    RtCurve,
};

const SHADES: [char; 5] = [' ', '·', '░', '▒', '█'];

fn shade(intensity: f64) -> char {
    let i = (intensity.clamp(0.0, 1.0) * (SHADES.len() - 1) as f64).round() as usize;
    SHADES[i]
}

impl Grid {
    /// Heatmap of the accumulated weights, max-pooled down to at most 60x30 characters.
    /// The top row of the output is the highest y bin.
    pub fn format_heatmap(&self) -> String {
        self.format_heatmap_sized((60, 30))
    }

    pub fn format_heatmap_sized(&self, max_sizes: (usize, usize)) -> String {
        let x_scale = self.bins.div_ceil(max_sizes.0.max(1)).max(1);
        let y_scale = self.bins.div_ceil(max_sizes.1.max(1)).max(1);
        let cols = self.bins.div_ceil(x_scale);
        let rows = self.bins.div_ceil(y_scale);
        let max_weight = self.weights.iter().cloned().fold(0.0, f64::max);

        let mut output = String::new();
        output.push('+');
        output.push_str(&"-".repeat(cols));
        output.push_str("+\n");
        for display_r in (0..rows).rev() {
            output.push('|');
            for display_c in 0..cols {
                let mut pooled = 0.0f64;
                for r in (display_r * y_scale)..((display_r + 1) * y_scale).min(self.bins) {
                    for c in (display_c * x_scale)..((display_c + 1) * x_scale).min(self.bins) {
                        pooled = pooled.max(self.weights[r * self.bins + c]);
                    }
                }
                let intensity = if max_weight > 0.0 {
                    pooled / max_weight
                } else {
                    0.0
                };
                output.push(shade(intensity));
            }
            output.push_str("|\n");
        }
        output.push('+');
        output.push_str(&"-".repeat(cols));
        output.push('+');
        output
    }
}

/// Samples the curve across its knot range and draws it as a character plot.
pub fn plot_curve(curve: &RtCurve, width: usize, height: usize) -> String {
    let width = width.max(2);
    let height = height.max(2);
    let (x_min, x_max) = curve.x_range();
    let samples: Vec<f64> = (0..width)
        .map(|i| curve.predict_or_extrapolate(x_min + (x_max - x_min) * i as f64 / (width - 1) as f64))
        .collect();
    let y_min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let y_max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let y_span = if y_max > y_min { y_max - y_min } else { 1.0 };

    let mut canvas = vec![vec![' '; width]; height];
    for (col, y) in samples.iter().enumerate() {
        let row = ((1.0 - (y - y_min) / y_span) * (height - 1) as f64).round() as usize;
        canvas[row.min(height - 1)][col] = '*';
    }

    let mut output = String::new();
    for row in canvas {
        output.push('|');
        output.extend(row);
        output.push('\n');
    }
    output.push_str(&format!(
        "x: [{:.2}, {:.2}]  y: [{:.2}, {:.2}]",
        x_min, x_max, y_min, y_max
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    #[test]
    fn test_heatmap_dimensions() {
        let mut grid = Grid::new(120, (0.0, 1.0), (0.0, 1.0)).unwrap();
        grid.add_point(&Point::new(0.5, 0.5)).unwrap();
        let text = grid.format_heatmap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 30 + 2);
        assert_eq!(lines[1].chars().count(), 60 + 2);
        assert!(text.contains('█'));
    }

    #[test]
    fn test_plot_curve_marks_every_column() {
        let curve = RtCurve::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)]).unwrap();
        let text = plot_curve(&curve, 20, 5);
        assert_eq!(text.matches('*').count(), 20);
    }
}
