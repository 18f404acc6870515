//! Pairwise m/z matching under a ppm tolerance.
//!
//! Candidates are every `(i, j)` with `|A[i] - B[j]| <= ppm * 1e-6 * A[i]`. They are
//! accepted greedily from the closest (smallest absolute ppm) to the farthest, and
//! an index on either side is used at most once. Equal distances resolve to the
//! lower `i`, then the lower `j`, so results never depend on input quirks.
//!
//! Inputs are usually ascending, but nothing here relies on it: the reference
//! grid grows by appending, and its lists are matched as they are.

/// Matched index pairs, ordered by the index into `A`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MzMatches {
    pub matched: Vec<(usize, usize)>,
    /// `(A[i] - B[j]) / A[i]` for each matched pair, in the same order.
    pub residual_ratio: Vec<f64>,
}

impl MzMatches {
    pub fn len(&self) -> usize {
        self.matched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Mean residual ratio, 0 when nothing matched.
    pub fn mean_residual_ratio(&self) -> f64 {
        if self.residual_ratio.is_empty() {
            return 0.0;
        }
        self.residual_ratio.iter().sum::<f64>() / self.residual_ratio.len() as f64
    }
}

/// Matches plus the indices left over on each side, both ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteMzMatches {
    pub matches: MzMatches,
    pub unmatched_a: Vec<usize>,
    pub unmatched_b: Vec<usize>,
}

/// Signed ppm difference of `observed` against `reference`.
#[inline]
pub fn ppm_delta(observed: f64, reference: f64) -> f64 {
    (observed - reference) / reference * 1e6
}

fn candidate_pairs(a: &[f64], b: &[f64], ppm: f64) -> Vec<(f64, usize, usize)> {
    let mut b_sorted: Vec<(f64, usize)> = b
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(j, v)| (*v, j))
        .collect();
    b_sorted.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

    let mut candidates = Vec::new();
    for (i, ai) in a.iter().enumerate() {
        if !(ai.is_finite() && *ai > 0.0) {
            continue;
        }
        let tol = ppm * 1e-6 * ai;
        let start = b_sorted.partition_point(|(v, _)| *v < ai - tol);
        for (bj, j) in b_sorted[start..].iter() {
            if *bj > ai + tol {
                break;
            }
            let diff = (ai - bj).abs();
            if diff <= tol {
                candidates.push((diff / ai, i, *j));
            }
        }
    }
    candidates.sort_by(|x, y| {
        x.0.total_cmp(&y.0)
            .then(x.1.cmp(&y.1))
            .then(x.2.cmp(&y.2))
    });
    candidates
}

fn greedy_matches(a: &[f64], b: &[f64], ppm: f64) -> (MzMatches, Vec<bool>, Vec<bool>) {
    let mut used_a = vec![false; a.len()];
    let mut used_b = vec![false; b.len()];
    let mut matched = Vec::new();
    for (_, i, j) in candidate_pairs(a, b, ppm) {
        if used_a[i] || used_b[j] {
            continue;
        }
        used_a[i] = true;
        used_b[j] = true;
        matched.push((i, j));
    }
    matched.sort_unstable();
    let residual_ratio = matched.iter().map(|(i, j)| (a[*i] - b[*j]) / a[*i]).collect();
    (
        MzMatches {
            matched,
            residual_ratio,
        },
        used_a,
        used_b,
    )
}

/// Matches `a` against `b` within `ppm`.
pub fn mass_paired_mapping(a: &[f64], b: &[f64], ppm: f64) -> MzMatches {
    greedy_matches(a, b, ppm).0
}

/// Same as [`mass_paired_mapping`], also reporting what stayed unmatched.
pub fn complete_mass_paired_mapping(a: &[f64], b: &[f64], ppm: f64) -> CompleteMzMatches {
    let (matches, used_a, used_b) = greedy_matches(a, b, ppm);
    let unused = |used: Vec<bool>| -> Vec<usize> {
        used.into_iter()
            .enumerate()
            .filter(|(_, u)| !u)
            .map(|(k, _)| k)
            .collect()
    };
    CompleteMzMatches {
        matches,
        unmatched_a: unused(used_a),
        unmatched_b: unused(used_b),
    }
}
