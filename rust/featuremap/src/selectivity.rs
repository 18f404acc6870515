/// Mass selectivity of every value in an ascending m/z list.
///
/// A value's score depends on the ppm distance `d` to its nearest neighbour:
/// `1 - exp(-d^2 / (2 * std_ppm^2))`. Well separated values approach 1; values
/// sharing their m/z with another (within the instrument spread) approach 0.
/// A lone value scores 1.
pub fn calculate_selectivity(sorted_mz: &[f64], std_ppm: f64) -> Vec<f64> {
    let n = sorted_mz.len();
    if n == 1 {
        return vec![1.0];
    }
    let gap_ppm = |k: usize| (sorted_mz[k + 1] - sorted_mz[k]) / sorted_mz[k] * 1e6;
    let score = |d: f64| -> f64 {
        let s = 1.0 - (-(d * d) / (2.0 * std_ppm * std_ppm)).exp();
        if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 }
    };

    (0..n)
        .map(|k| {
            let left = if k > 0 { gap_ppm(k - 1) } else { f64::INFINITY };
            let right = if k + 1 < n { gap_ppm(k) } else { f64::INFINITY };
            score(left.min(right))
        })
        .collect()
}
