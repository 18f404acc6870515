use crate::config::ProcessingConfig;
use crate::models::{
    CalibratedTimes,
    InvalidReason,
    Sample,
};
use crate::utils::stats::median;
use rtcurve::{
    Point,
    RtCurve,
};
use std::collections::BTreeMap;
use tracing::{
    debug,
    warn,
};

/// Peaks need a selectivity above this to anchor the RT calibration.
pub const MIN_ANCHOR_SELECTIVITY: f64 = 0.98;
/// Peaks need a goodness of fit above this to anchor the RT calibration.
pub const MIN_ANCHOR_QUALITY: f64 = 0.9;
/// Pairs whose relative shift reaches this are left out of the fit.
pub const MAX_RELATIVE_SHIFT: f64 = 0.2;
/// Margin applied to the largest time when placing the right end anchor.
const RIGHT_END_MARGIN: f64 = 1.1;
/// Cap on the number of samples an identity must appear in.
const MAX_REQUIRED_PRESENCE: usize = 10;

/// Retention time of every identity carried by exactly one eligible peak of `sample`.
///
/// Eligible peaks have a reference identity, a selectivity above 0.98 and a
/// goodness of fit above 0.9.
pub fn anchor_times(sample: &Sample) -> BTreeMap<String, f64> {
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for peak in sample.peaks.iter() {
        if !(peak.selectivity > MIN_ANCHOR_SELECTIVITY && peak.goodness_of_fit() > MIN_ANCHOR_QUALITY) {
            continue;
        }
        if let Some(identity) = sample.identity_of(peak) {
            grouped
                .entry(identity)
                .or_default()
                .push(peak.retention_time);
        }
    }
    grouped
        .into_iter()
        .filter(|(_, times)| times.len() == 1)
        .map(|(identity, times)| (identity.to_string(), times[0]))
        .collect()
}

/// Number of samples an identity must be eligible in to get a reference time.
pub fn required_presence(valid_samples: usize) -> usize {
    (valid_samples / 2).min(MAX_REQUIRED_PRESENCE).max(1)
}

/// Median retention time of every identity found in at least `min_presence` samples.
pub fn reference_times(
    per_sample: &[BTreeMap<String, f64>],
    min_presence: usize,
) -> BTreeMap<String, f64> {
    let mut collected: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for times in per_sample {
        for (identity, rt) in times.iter() {
            collected.entry(identity.as_str()).or_default().push(*rt);
        }
    }
    collected
        .into_iter()
        .filter(|(_, rts)| rts.len() >= min_presence)
        .filter_map(|(identity, rts)| median(&rts).map(|m| (identity.to_string(), m)))
        .collect()
}

/// Maps each sample's retention times onto the experiment-wide reference times.
#[derive(Debug, Clone, PartialEq)]
pub struct RTCalibrator {
    pub min_pairs: usize,
    pub max_rtime: Option<f64>,
    pub grid_size: usize,
}

impl From<&ProcessingConfig> for RTCalibrator {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            min_pairs: config.peak_number_rt_calibration,
            max_rtime: config.max_rtime,
            grid_size: config.rt_grid_size,
        }
    }
}

impl RTCalibrator {
    /// `(sample_rtime, reference_rtime)` for every anchor identity with a reference time.
    pub fn calibration_pairs(
        &self,
        sample: &Sample,
        reference: &BTreeMap<String, f64>,
    ) -> Vec<(f64, f64)> {
        anchor_times(sample)
            .into_iter()
            .filter_map(|(identity, x)| reference.get(&identity).map(|y| (x, *y)))
            .collect()
    }

    /// Fits the calibration curve of `sample` and applies it to every peak.
    ///
    /// Samples with fewer than `min_pairs` anchors, or whose curve cannot be fit,
    /// are marked invalid and left otherwise untouched.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn calibrate(&self, sample: &mut Sample, reference: &BTreeMap<String, f64>) {
        let pairs = self.calibration_pairs(sample, reference);
        if pairs.len() < self.min_pairs {
            warn!(
                "Sample {} has {} RT calibration peaks ({} required), excluding it",
                sample.name,
                pairs.len(),
                self.min_pairs
            );
            sample.invalidate(InvalidReason::TooFewRtAnchors {
                found: pairs.len(),
                required: self.min_pairs,
            });
            return;
        }

        let kept: Vec<(f64, f64)> = pairs
            .iter()
            .copied()
            .filter(|(x, y)| *y > 0.0 && ((x - y) / y).abs() < MAX_RELATIVE_SHIFT)
            .collect();
        debug!(
            "Sample {}: {} RT pairs, {} after dropping large shifts",
            sample.name,
            pairs.len(),
            kept.len()
        );

        let observed = kept
            .iter()
            .flat_map(|(x, y)| [*x, *y])
            .chain(sample.max_rtime())
            .fold(0.0_f64, f64::max);
        let right_end = RIGHT_END_MARGIN * self.max_rtime.unwrap_or(0.0).max(observed);
        let points: Vec<Point> = kept.iter().map(|(x, y)| Point::new(*x, *y)).collect();

        match rtcurve::fit_anchored(
            &points,
            Point::new(0.0, 0.0),
            Point::new(right_end, right_end),
            self.grid_size,
        ) {
            Ok(curve) => apply_rt_calibration(sample, curve),
            Err(e) => {
                warn!("Sample {}: RT curve fit failed ({}), excluding it", sample.name, e);
                sample.invalidate(InvalidReason::RtCurveFailed { msg: e.to_string() });
            }
        }
    }
}

/// Writes calibrated apex and base times to every peak and stores the curve.
pub fn apply_rt_calibration(sample: &mut Sample, curve: RtCurve) {
    for peak in sample.peaks.iter_mut() {
        peak.calibrated = Some(CalibratedTimes {
            apex: curve.predict_or_extrapolate(peak.retention_time),
            left: curve.predict_or_extrapolate(peak.left_rtime),
            right: curve.predict_or_extrapolate(peak.right_rtime),
        });
    }
    sample.rt_calibration = Some(curve);
}
