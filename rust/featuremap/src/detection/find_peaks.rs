//! Local maxima with height, prominence and width filters on a 1D signal.
//!
//! Follows the conventions of the usual `find_peaks` routine: plateaus resolve to
//! their middle sample, prominence bases are the lowest points reached before
//! strictly higher ground (or the edge of an optional window), and widths are
//! measured at half prominence with linear interpolation.

#[derive(Debug, Clone, PartialEq)]
pub struct PeakCandidate {
    pub index: usize,
    pub height: f64,
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
    /// Width at half prominence, in samples.
    pub width: f64,
    pub left_ips: f64,
    pub right_ips: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FindPeaksParams {
    pub min_height: Option<f64>,
    pub min_prominence: Option<f64>,
    pub min_width: Option<f64>,
    /// Window length (in samples) searched for prominence bases.
    pub wlen: Option<usize>,
}

fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if x.len() < 3 {
        return maxima;
    }
    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    maxima
}

fn prominence(x: &[f64], peak: usize, wlen: Option<usize>) -> (f64, usize, usize) {
    let (i_min, i_max) = match wlen {
        Some(w) if w > 1 => {
            // Even windows grow to the next odd length.
            let half = w / 2;
            (peak.saturating_sub(half), (peak + half).min(x.len() - 1))
        }
        _ => (0, x.len() - 1),
    };
    let top = x[peak];

    let mut left_base = peak;
    let mut left_min = top;
    let mut i = peak;
    loop {
        if x[i] > top {
            break;
        }
        if x[i] < left_min {
            left_min = x[i];
            left_base = i;
        }
        if i == i_min {
            break;
        }
        i -= 1;
    }

    let mut right_base = peak;
    let mut right_min = top;
    for (j, v) in x.iter().enumerate().take(i_max + 1).skip(peak) {
        if *v > top {
            break;
        }
        if *v < right_min {
            right_min = *v;
            right_base = j;
        }
    }

    (top - left_min.max(right_min), left_base, right_base)
}

/// Width at half prominence, interpolated, bounded by the prominence bases.
fn half_prominence_width(
    x: &[f64],
    peak: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
) -> (f64, f64, f64) {
    let height = x[peak] - prominence * 0.5;

    let mut i = peak;
    while left_base < i && height < x[i] {
        i -= 1;
    }
    let mut left_ip = i as f64;
    if x[i] < height {
        left_ip += (height - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = peak;
    while i < right_base && height < x[i] {
        i += 1;
    }
    let mut right_ip = i as f64;
    if x[i] < height {
        right_ip -= (height - x[i]) / (x[i - 1] - x[i]);
    }

    (right_ip - left_ip, left_ip, right_ip)
}

/// Peaks of `x` passing every filter in `params`, in ascending index order.
pub fn find_peaks(x: &[f64], params: &FindPeaksParams) -> Vec<PeakCandidate> {
    let mut maxima = local_maxima(x);
    if let Some(h) = params.min_height {
        maxima.retain(|p| x[*p] >= h);
    }

    maxima
        .into_iter()
        .filter_map(|peak| {
            let (prom, left_base, right_base) = prominence(x, peak, params.wlen);
            if params.min_prominence.is_some_and(|p| prom < p) {
                return None;
            }
            let (width, left_ips, right_ips) =
                half_prominence_width(x, peak, prom, left_base, right_base);
            if params.min_width.is_some_and(|w| width < w) {
                return None;
            }
            Some(PeakCandidate {
                index: peak,
                height: x[peak],
                prominence: prom,
                left_base,
                right_base,
                width,
                left_ips,
                right_ips,
            })
        })
        .collect()
}
