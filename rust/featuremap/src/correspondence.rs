//! Grouping of peaks across samples into features.
//!
//! Peaks carrying a reference identity are grouped by it. The rest are binned on
//! their consensus m/z, which is the reference grid value their trace maps to
//! when the sample was aligned. Each group is then split wherever consecutive
//! retention times are further apart than the tolerance, and every piece becomes
//! one feature.

use crate::alignment::ReferenceGrid;
use crate::config::ProcessingConfig;
use crate::models::{
    Feature,
    Peak,
    Sample,
};
use crate::utils::stats::median;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use tracing::info;

/// Prefix of the mass id of features without a reference identity.
pub const UNIDENTIFIED_PREFIX: &str = "_M_";

/// Groups indices of ascending `sorted_mz` into bins.
///
/// A value joins the current bin while it stays within `ppm` of the bin's median,
/// otherwise it opens a new one.
pub fn bin_by_median(sorted_mz: &[f64], ppm: f64) -> Vec<Vec<usize>> {
    let mut bins: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for (i, mz) in sorted_mz.iter().enumerate() {
        if let Some(center) = sorted_median(&current, sorted_mz) {
            if (mz - center).abs() > ppm * 1e-6 * mz {
                bins.push(std::mem::take(&mut current));
            }
        }
        current.push(i);
    }
    if !current.is_empty() {
        bins.push(current);
    }
    bins
}

fn sorted_median(indices: &[usize], values: &[f64]) -> Option<f64> {
    let n = indices.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(values[indices[n / 2]])
    } else {
        Some((values[indices[n / 2 - 1]] + values[indices[n / 2]]) / 2.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct PeakRef<'a> {
    sample: usize,
    peak: &'a Peak,
    /// m/z used for binning.
    consensus_mz: f64,
}

fn split_by_rtime<'a>(mut group: Vec<PeakRef<'a>>, tolerance: f64) -> Vec<Vec<PeakRef<'a>>> {
    group.sort_by(|a, b| a.peak.rtime().total_cmp(&b.peak.rtime()));
    let mut pieces: Vec<Vec<PeakRef<'a>>> = Vec::new();
    for p in group {
        match pieces.last_mut() {
            Some(piece)
                if piece
                    .last()
                    .is_some_and(|q| p.peak.rtime() - q.peak.rtime() <= tolerance) =>
            {
                piece.push(p)
            }
            _ => pieces.push(vec![p]),
        }
    }
    pieces
}

/// Builds features from the valid samples of an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceBuilder {
    pub rtime_tolerance: f64,
    /// Experiment mass spread; unidentified peaks are binned at twice this.
    pub mass_stdev_ppm: f64,
}

impl CorrespondenceBuilder {
    pub fn new(config: &ProcessingConfig, mass_stdev_ppm: f64) -> Self {
        Self {
            rtime_tolerance: config.rtime_tolerance,
            mass_stdev_ppm,
        }
    }

    fn make_feature(&self, mass_id: &str, peaks: &[PeakRef<'_>], samples: &[&Sample]) -> Feature {
        let mzs: Vec<f64> = peaks.iter().map(|p| p.peak.mz).collect();
        let rtimes: Vec<f64> = peaks.iter().map(|p| p.peak.rtime()).collect();
        let qualities: Vec<f64> = peaks.iter().map(|p| p.peak.goodness_of_fit()).collect();
        let n = peaks.len() as f64;

        let mut per_sample_intensity: BTreeMap<String, f64> = BTreeMap::new();
        let mut rt_min = f64::INFINITY;
        let mut rt_max = f64::NEG_INFINITY;
        for p in peaks {
            let (left, right) = p.peak.rt_bounds();
            rt_min = rt_min.min(left);
            rt_max = rt_max.max(right);
            let area = p.peak.area();
            per_sample_intensity
                .entry(samples[p.sample].name.clone())
                .and_modify(|v| *v = v.max(area))
                .or_insert(area);
        }
        let distinct: BTreeSet<usize> = peaks.iter().map(|p| p.sample).collect();

        Feature {
            id: String::new(),
            mass_id: mass_id.to_string(),
            mz: median(&mzs).unwrap_or(f64::NAN),
            rtime: median(&rtimes).unwrap_or(f64::NAN),
            rt_min,
            rt_max,
            number_peaks: peaks.len(),
            peak_quality_max: qualities.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            peak_quality_median: median(&qualities).unwrap_or(0.0),
            intensity_mean: peaks.iter().map(|p| p.peak.area()).sum::<f64>() / n,
            selectivity_mz: peaks.iter().map(|p| p.peak.selectivity).sum::<f64>() / n,
            presence: distinct.len() as f64 / samples.len() as f64,
            per_sample_intensity,
        }
    }

    /// Features of the valid samples in `samples`, ordered by m/z then retention time
    /// and numbered `F1`, `F2`, ...
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn build(&self, samples: &[Sample], grid: Option<&ReferenceGrid>) -> Vec<Feature> {
        let valid: Vec<&Sample> = samples.iter().filter(|s| s.is_valid()).collect();
        if valid.is_empty() {
            return Vec::new();
        }

        let mut identified: BTreeMap<&str, Vec<PeakRef<'_>>> = BTreeMap::new();
        let mut unidentified: Vec<PeakRef<'_>> = Vec::new();
        for (k, sample) in valid.iter().copied().enumerate() {
            let positions = sample.trace_positions();
            for peak in sample.peaks.iter() {
                let consensus_mz = grid
                    .and_then(|g| {
                        positions
                            .get(peak.trace_index)
                            .and_then(|pos| g.consensus_mz(sample.id, *pos))
                    })
                    .unwrap_or(peak.mz);
                let r = PeakRef {
                    sample: k,
                    peak,
                    consensus_mz,
                };
                match sample.identity_of(peak) {
                    Some(identity) => identified.entry(identity).or_default().push(r),
                    None => unidentified.push(r),
                }
            }
        }

        let mut groups: Vec<(String, Vec<PeakRef<'_>>)> = identified
            .into_iter()
            .map(|(identity, peaks)| (identity.to_string(), peaks))
            .collect();

        unidentified.sort_by(|a, b| a.consensus_mz.total_cmp(&b.consensus_mz));
        let sorted_mz: Vec<f64> = unidentified.iter().map(|p| p.consensus_mz).collect();
        for bin in bin_by_median(&sorted_mz, 2.0 * self.mass_stdev_ppm) {
            let center = sorted_median(&bin, &sorted_mz).unwrap_or(f64::NAN);
            let peaks = bin.iter().map(|i| unidentified[*i]).collect();
            groups.push((format!("{}{:.6}", UNIDENTIFIED_PREFIX, center), peaks));
        }

        let mut features: Vec<Feature> = groups
            .into_iter()
            .flat_map(|(mass_id, peaks)| {
                split_by_rtime(peaks, self.rtime_tolerance)
                    .into_iter()
                    .map(move |piece| (mass_id.clone(), piece))
            })
            .map(|(mass_id, piece)| self.make_feature(&mass_id, &piece, &valid))
            .collect();

        features.sort_by(|a, b| a.mz.total_cmp(&b.mz).then(a.rtime.total_cmp(&b.rtime)));
        for (i, f) in features.iter_mut().enumerate() {
            f.id = format!("F{}", i + 1);
        }
        info!(
            "Built {} features from {} valid samples",
            features.len(),
            valid.len()
        );
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CalibratedTimes,
        MassTrace,
    };
    use crate::peak_model::{
        FitOutcome,
        GaussianParams,
    };

    fn peak(trace_index: usize, mz: f64, rt: f64, area: f64, mzstr: String) -> Peak {
        Peak {
            id: trace_index,
            trace_index,
            mz,
            apex_index: 1,
            left_base_index: 0,
            right_base_index: 2,
            height: 100.0,
            fit: FitOutcome::Fit {
                params: GaussianParams {
                    amplitude: 100.0,
                    center: rt,
                    sigma: 1.0,
                },
                area,
                goodness_of_fit: 0.95,
            },
            retention_time: rt,
            left_rtime: rt - 3.0,
            right_rtime: rt + 3.0,
            calibrated: None,
            selectivity: 1.0,
            mzstr: Some(mzstr),
        }
    }

    /// Sample with one trace and peak per `(mz, rt, area, identity)` entry.
    fn sample(id: usize, entries: &[(f64, f64, f64, Option<&str>)]) -> Sample {
        let mut traces = Vec::new();
        let mut peaks = Vec::new();
        let mut identities = std::collections::HashMap::new();
        for (i, (mz, rt, area, identity)) in entries.iter().enumerate() {
            let trace = MassTrace::try_new(i, *mz, vec![0.0, 1.0, 2.0], vec![1.0, 5.0, 1.0]).unwrap();
            if let Some(identity) = identity {
                identities.insert(trace.mzstr(), identity.to_string());
            }
            peaks.push(peak(i, *mz, *rt, *area, trace.mzstr()));
            traces.push(trace);
        }
        let mut s = Sample::new(id, format!("sample{}", id), traces);
        s.peaks = peaks;
        s.mz_identities = identities;
        s
    }

    #[test]
    fn test_bin_by_median() {
        let mz = [100.0, 100.0002, 100.0004, 100.01, 200.0];
        let bins = bin_by_median(&mz, 10.0);
        assert_eq!(bins, vec![vec![0, 1, 2], vec![3], vec![4]]);
        assert!(bin_by_median(&[], 10.0).is_empty());
    }

    #[test]
    fn test_identified_peaks_merge_and_untagged_stay_alone() {
        let glucose = Some("C6H12O6_180.0634");
        let samples = vec![
            sample(0, &[(181.0707, 100.0, 10.0, glucose)]),
            sample(1, &[(181.0708, 102.0, 20.0, glucose)]),
            sample(2, &[(181.0706, 101.0, 30.0, glucose)]),
            sample(3, &[(455.2, 300.0, 40.0, None)]),
        ];
        let builder = CorrespondenceBuilder::new(&ProcessingConfig::default(), 5.0);
        let features = builder.build(&samples, None);
        assert_eq!(features.len(), 2);

        let merged = &features[0];
        assert_eq!(merged.id, "F1");
        assert_eq!(merged.mass_id, "C6H12O6_180.0634");
        assert_eq!(merged.per_sample_intensity.len(), 3);
        assert_eq!(merged.number_peaks, 3);
        assert_eq!(merged.rtime, 101.0);
        assert_eq!((merged.rt_min, merged.rt_max), (97.0, 105.0));
        assert_eq!(merged.intensity_mean, 20.0);
        assert!((merged.presence - 0.75).abs() < 1e-12);

        let single = &features[1];
        assert_eq!(single.mass_id, "_M_455.200000");
        assert_eq!(single.per_sample_intensity.len(), 1);
        assert_eq!(single.per_sample_intensity.get("sample3"), Some(&40.0));
    }

    #[test]
    fn test_groups_split_on_retention_time_gaps() {
        let samples = vec![
            sample(0, &[(300.0, 100.0, 1.0, None), (300.0005, 400.0, 2.0, None)]),
            sample(1, &[(300.0003, 120.0, 3.0, None)]),
        ];
        let builder = CorrespondenceBuilder::new(&ProcessingConfig::default(), 5.0);
        let features = builder.build(&samples, None);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].number_peaks, 2);
        assert_eq!(features[1].number_peaks, 1);
        assert_eq!(features[1].rtime, 400.0);
    }

    #[test]
    fn test_invalid_samples_are_left_out() {
        let mut bad = sample(1, &[(181.0707, 100.0, 10.0, Some("X"))]);
        bad.invalidate(crate::models::InvalidReason::TooFewRtAnchors {
            found: 3,
            required: 50,
        });
        let samples = vec![sample(0, &[(181.0707, 100.0, 10.0, Some("X"))]), bad];
        let features = CorrespondenceBuilder::new(&ProcessingConfig::default(), 5.0)
            .build(&samples, None);
        assert_eq!(features.len(), 1);
        assert!(!features[0].per_sample_intensity.contains_key("sample1"));
        assert_eq!(features[0].presence, 1.0);
    }

    #[test]
    fn test_calibrated_times_are_used() {
        let mut s = sample(0, &[(250.0, 100.0, 1.0, None)]);
        s.peaks[0].calibrated = Some(CalibratedTimes {
            apex: 90.0,
            left: 88.0,
            right: 93.0,
        });
        let features = CorrespondenceBuilder::new(&ProcessingConfig::default(), 5.0)
            .build(&[s], None);
        assert_eq!(features[0].rtime, 90.0);
        assert_eq!((features[0].rt_min, features[0].rt_max), (88.0, 93.0));
    }
}
