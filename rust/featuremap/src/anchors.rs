use crate::models::Sample;

/// Mass difference between 13C and 12C.
pub const C13_SPACING: f64 = 1.003_355;

/// Apex time and height of the strongest peak on a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrongestApex {
    pub rtime: f64,
    pub height: f64,
}

/// Isotope anchor pairs within one ascending m/z list.
///
/// Position `i` pairs with the position whose m/z is closest to
/// `mz[i] + 1.003355`, provided it lies within `std_ppm`, both strongest peaks
/// co-elute within `rtime_tolerance`, and the satellite is the weaker of the two.
/// A position takes part in at most one pair. Pairs are `(monoisotopic, satellite)`
/// and come out ordered by the first member.
pub fn find_anchor_pairs(
    mz_list: &[f64],
    apexes: &[Option<StrongestApex>],
    std_ppm: f64,
    rtime_tolerance: f64,
) -> Vec<(usize, usize)> {
    let mut used = vec![false; mz_list.len()];
    let mut pairs = Vec::new();

    for i in 0..mz_list.len() {
        if used[i] {
            continue;
        }
        let Some(mono) = apexes.get(i).copied().flatten() else {
            continue;
        };
        let target = mz_list[i] + C13_SPACING;
        let tol = target * std_ppm * 1e-6;

        let start = mz_list.partition_point(|m| *m < target - tol);
        let closest = mz_list[start..]
            .iter()
            .enumerate()
            .take_while(|(_, m)| **m <= target + tol)
            .map(|(k, m)| (start + k, (m - target).abs()))
            .filter(|(j, _)| !used[*j] && *j != i)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((j, _)) = closest else {
            continue;
        };
        let Some(satellite) = apexes.get(j).copied().flatten() else {
            continue;
        };
        if (mono.rtime - satellite.rtime).abs() > rtime_tolerance {
            continue;
        }
        if !(satellite.height < mono.height) {
            continue;
        }
        used[i] = true;
        used[j] = true;
        pairs.push((i, j));
    }
    pairs
}

/// Strongest apex of every `mz_list` position of `sample`, `None` for traces without peaks.
pub fn strongest_apexes(sample: &Sample) -> Vec<Option<StrongestApex>> {
    let mut by_trace: Vec<Option<StrongestApex>> = vec![None; sample.traces.len()];
    for peak in sample.peaks.iter() {
        let Some(slot) = by_trace.get_mut(peak.trace_index) else {
            continue;
        };
        let candidate = StrongestApex {
            rtime: peak.retention_time,
            height: peak.height,
        };
        if slot.is_none_or(|current| candidate.height > current.height) {
            *slot = Some(candidate);
        }
    }
    sample.mz_order.iter().map(|t| by_trace[*t]).collect()
}

/// Finds the anchor pairs of `sample` and stores them on it.
pub fn assign_anchor_pairs(sample: &mut Sample, std_ppm: f64, rtime_tolerance: f64) {
    let apexes = strongest_apexes(sample);
    sample.anchor_pairs = find_anchor_pairs(&sample.mz_list, &apexes, std_ppm, rtime_tolerance);
}
