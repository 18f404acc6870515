pub mod find_peaks;

use crate::config::ProcessingConfig;
use crate::models::{
    MassTrace,
    Peak,
};
use crate::peak_model::{
    FitOutcome,
    GaussianParams,
    PeakModel,
};
use crate::utils::stats::population_stdev;
pub use find_peaks::{
    FindPeaksParams,
    PeakCandidate,
    find_peaks,
};
use tracing::trace;

/// Prominence floor, as a fraction of the trace maximum, of the first pass.
const PROMINENCE_FRACTION: f64 = 0.05;
/// Prominence floor of the stricter second pass.
const STRICT_PROMINENCE_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionParams {
    pub min_intensity: f64,
    pub min_width: f64,
    pub min_prominence: f64,
    pub snr: f64,
    pub gaussian_shape_threshold: f64,
    pub prominence_window: Option<usize>,
    pub stricter_rerun: bool,
}

impl From<&ProcessingConfig> for DetectionParams {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            min_intensity: config.min_intensity,
            min_width: config.min_peak_width,
            min_prominence: config.min_prominence,
            snr: config.snr,
            gaussian_shape_threshold: config.gaussian_shape_threshold,
            prominence_window: config.prominence_window,
            stricter_rerun: config.stricter_rerun,
        }
    }
}

/// Mean intensity of the points outside every candidate's base-to-base span.
/// 0 when the spans cover the whole trace.
pub fn noise_level(intensities: &[f64], candidates: &[PeakCandidate]) -> f64 {
    let mut covered = vec![false; intensities.len()];
    for c in candidates {
        let end = c.right_base.min(intensities.len().saturating_sub(1));
        for flag in covered[c.left_base..=end].iter_mut() {
            *flag = true;
        }
    }
    let (sum, count) = intensities
        .iter()
        .zip(covered.iter())
        .filter(|(_, c)| !**c)
        .fold((0.0, 0usize), |(s, n), (v, _)| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Finds chromatographic peaks on single mass traces.
///
/// Candidates come from prominence-based local maxima. Those standing above
/// `snr` times the noise floor are fit with a Gaussian, and only the ones whose
/// goodness of fit exceeds the shape threshold are returned.
#[derive(Debug, Clone)]
pub struct TracePeakDetector {
    pub params: DetectionParams,
    pub model: PeakModel,
}

impl TracePeakDetector {
    pub fn new(params: DetectionParams) -> Self {
        Self {
            params,
            model: PeakModel::default(),
        }
    }

    fn candidates(&self, intensities: &[f64], max_intensity: f64, fraction: f64) -> Vec<PeakCandidate> {
        let params = FindPeaksParams {
            min_height: Some(self.params.min_intensity),
            min_prominence: Some(self.params.min_prominence.max(fraction * max_intensity)),
            min_width: Some(self.params.min_width),
            wlen: self.params.prominence_window,
        };
        find_peaks(intensities, &params)
    }

    /// Candidate peaks that pass the signal-to-noise gate, before shape fitting.
    pub fn screen(&self, intensities: &[f64]) -> Vec<PeakCandidate> {
        if intensities.is_empty() {
            return Vec::new();
        }
        let max_intensity = intensities.iter().cloned().fold(f64::MIN, f64::max);
        let mut candidates = self.candidates(intensities, max_intensity, PROMINENCE_FRACTION);
        if self.params.stricter_rerun && candidates.len() > 1 {
            candidates = self.candidates(intensities, max_intensity, STRICT_PROMINENCE_FRACTION);
        }

        let noise = noise_level(intensities, &candidates);
        candidates.retain(|c| c.height > self.params.snr * noise);
        candidates
    }

    /// Accepted peaks of `trace`, numbered from `first_peak_id`.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn detect(&self, trace: &MassTrace, trace_index: usize, first_peak_id: usize) -> Vec<Peak> {
        let times = trace.times();
        let intensities = trace.intensities();
        let candidates = self.screen(intensities);

        let mut peaks = Vec::with_capacity(candidates.len());
        for c in candidates {
            let x = &times[c.left_base..=c.right_base];
            let y = &intensities[c.left_base..=c.right_base];
            let guess = GaussianParams {
                amplitude: c.height,
                center: times[c.index],
                sigma: population_stdev(x),
            };
            let fit = self.model.fit(x, y, guess);
            let goodness = fit.goodness_of_fit();
            if !(goodness > self.params.gaussian_shape_threshold) {
                trace!(
                    "Rejected peak at {} on trace {} (goodness {:.3})",
                    times[c.index],
                    trace.id,
                    goodness
                );
                continue;
            }
            let retention_time = match &fit {
                FitOutcome::Fit { params, .. } => params.center,
                FitOutcome::FitFailed { .. } => times[c.index],
            };
            peaks.push(Peak {
                id: first_peak_id + peaks.len(),
                trace_index,
                mz: trace.mz(),
                apex_index: c.index,
                left_base_index: c.left_base,
                right_base_index: c.right_base,
                height: c.height,
                fit,
                retention_time,
                left_rtime: times[c.left_base],
                right_rtime: times[c.right_base],
                calibrated: None,
                selectivity: 1.0,
                mzstr: None,
            });
        }
        peaks
    }
}
