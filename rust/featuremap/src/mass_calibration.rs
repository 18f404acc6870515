use crate::config::ProcessingConfig;
use crate::models::{
    InvalidReason,
    Sample,
};
use crate::reference_masses::FormulaMassDatabase;
use crate::utils::stats::fit_normal;
use std::collections::HashMap;
use tracing::{
    debug,
    info,
    warn,
};

/// Result of one reference search over a sample's peaks.
#[derive(Debug, Clone, Default)]
struct SearchPass {
    deltas_ppm: Vec<f64>,
    identities: HashMap<String, String>,
}

/// What happened to a sample during mass calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct MassCalibrationReport {
    pub matches: usize,
    pub shift_ppm: Option<f64>,
    pub stdev_ppm: Option<f64>,
    pub corrected: bool,
}

/// Estimates and corrects the systematic mass error of a sample against
/// a list of known masses.
///
/// The shift is the mean of the ppm deltas of every matched peak and the
/// spread is their standard deviation. A shift beyond `shift_correction_ppm`
/// is removed from every trace and peak once, after which the search is
/// repeated at twice the spread to refresh the spread and the identities.
pub struct SampleMassCalibrator<'a> {
    db: &'a dyn FormulaMassDatabase,
    pub tolerance_ppm: f64,
    pub shift_correction_ppm: f64,
    pub min_matches: usize,
}

impl<'a> SampleMassCalibrator<'a> {
    pub fn new(db: &'a dyn FormulaMassDatabase, config: &ProcessingConfig) -> Self {
        Self {
            db,
            tolerance_ppm: config.mass_accuracy_check_ppm,
            shift_correction_ppm: config.mass_shift_correction_ppm,
            min_matches: config.min_mass_calibration_matches,
        }
    }

    fn search(&self, sample: &Sample, tolerance_ppm: f64) -> SearchPass {
        let mut pass = SearchPass::default();
        for peak in sample.peaks.iter() {
            let Some(hit) = self.db.search(peak.mz, tolerance_ppm) else {
                continue;
            };
            pass.deltas_ppm.push(hit.delta_ppm);
            if let Some(key) = peak.mzstr.as_ref() {
                pass.identities
                    .insert(key.clone(), hit.identity_key.to_string());
            }
        }
        pass
    }

    /// Calibrates `sample` in place. Samples with too few matches are marked invalid.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn calibrate(&self, sample: &mut Sample) -> MassCalibrationReport {
        let first = self.search(sample, self.tolerance_ppm);
        let matches = first.deltas_ppm.len();
        if matches < self.min_matches {
            warn!(
                "Sample {} has {} reference mass matches ({} required), excluding it",
                sample.name, matches, self.min_matches
            );
            sample.invalidate(InvalidReason::TooFewMassMatches {
                found: matches,
                required: self.min_matches,
            });
            return MassCalibrationReport {
                matches,
                shift_ppm: None,
                stdev_ppm: None,
                corrected: false,
            };
        }

        let Some((shift, stdev)) = fit_normal(&first.deltas_ppm) else {
            return MassCalibrationReport {
                matches,
                shift_ppm: None,
                stdev_ppm: None,
                corrected: false,
            };
        };
        sample.mass_shift_ppm = Some(shift);
        sample.mass_stdev_ppm = Some(stdev);
        sample.mz_identities = first.identities;
        debug!(
            "Sample {}: {} mass matches, shift {:.3} ppm, stdev {:.3} ppm",
            sample.name, matches, shift, stdev
        );

        let corrected = shift.abs() > self.shift_correction_ppm;
        if corrected {
            info!(
                "Correcting a mass shift of {:.3} ppm in sample {}",
                shift, sample.name
            );
            apply_mass_correction(sample, shift);

            let refreshed = self.search(sample, 2.0 * stdev);
            if refreshed.deltas_ppm.len() >= 2 {
                if let Some((_, new_stdev)) = fit_normal(&refreshed.deltas_ppm) {
                    sample.mass_stdev_ppm = Some(new_stdev);
                    sample.mz_identities = refreshed.identities;
                }
            } else {
                debug!(
                    "Sample {}: refreshed search found {} matches, keeping the first pass",
                    sample.name,
                    refreshed.deltas_ppm.len()
                );
            }
        }

        MassCalibrationReport {
            matches,
            shift_ppm: sample.mass_shift_ppm,
            stdev_ppm: sample.mass_stdev_ppm,
            corrected,
        }
    }
}

/// Removes `shift_ppm` from every trace and peak m/z of `sample`.
pub fn apply_mass_correction(sample: &mut Sample, shift_ppm: f64) {
    let factor = 1.0 - shift_ppm * 1e-6;
    for trace in sample.traces.iter_mut() {
        let corrected = trace.raw_mz() * factor;
        trace.set_calibrated_mz(corrected);
    }
    for peak in sample.peaks.iter_mut() {
        peak.mz *= factor;
    }
    sample.refresh_mz_list();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        MassTrace,
        Peak,
    };
    use crate::peak_model::{
        FitOutcome,
        GaussianParams,
    };
    use crate::reference_masses::{
        ReferenceMass,
        ReferenceMassList,
    };

    fn reference(n: usize) -> ReferenceMassList {
        ReferenceMassList::new(
            (0..n)
                .map(|i| ReferenceMass {
                    identity: format!("M{}", i),
                    mz: 100.0 + 37.0 * i as f64,
                })
                .collect(),
        )
    }

    fn peak(id: usize, trace_index: usize, mz: f64, mzstr: String) -> Peak {
        Peak {
            id,
            trace_index,
            mz,
            apex_index: 1,
            left_base_index: 0,
            right_base_index: 2,
            height: 10.0,
            fit: FitOutcome::Fit {
                params: GaussianParams {
                    amplitude: 10.0,
                    center: 1.0,
                    sigma: 0.5,
                },
                area: 12.5,
                goodness_of_fit: 0.99,
            },
            retention_time: 1.0,
            left_rtime: 0.0,
            right_rtime: 2.0,
            calibrated: None,
            selectivity: 1.0,
            mzstr: Some(mzstr),
        }
    }

    /// One trace and one peak per reference mass, offset by `shift_ppm` plus a
    /// small alternating jitter.
    fn shifted_sample(n: usize, shift_ppm: f64) -> Sample {
        let mut traces = Vec::new();
        let mut peaks = Vec::new();
        for i in 0..n {
            let jitter = if i % 2 == 0 { 0.5 } else { -0.5 };
            let mz = (100.0 + 37.0 * i as f64) * (1.0 + (shift_ppm + jitter) * 1e-6);
            let trace =
                MassTrace::try_new(i, mz, vec![0.0, 1.0, 2.0], vec![1.0, 10.0, 1.0]).unwrap();
            peaks.push(peak(i, i, mz, trace.mzstr()));
            traces.push(trace);
        }
        let mut sample = Sample::new(0, "s", traces);
        sample.peaks = peaks;
        sample
    }

    #[test]
    fn test_small_shift_is_measured_not_corrected() {
        let db = reference(12);
        let calibrator = SampleMassCalibrator::new(&db, &ProcessingConfig::default());
        let mut sample = shifted_sample(12, 2.0);
        let report = calibrator.calibrate(&mut sample);
        assert!(!report.corrected);
        assert_eq!(report.matches, 12);
        assert!((sample.mass_shift_ppm.unwrap() - 2.0).abs() < 1e-3);
        assert!((sample.mass_stdev_ppm.unwrap() - 0.5).abs() < 1e-3);
        assert!(sample.traces.iter().all(|t| t.calibrated_mz().is_none()));
        assert_eq!(sample.mz_identities.len(), 12);
        assert!(sample.is_valid());
    }

    #[test]
    fn test_large_shift_is_corrected_once() {
        let db = reference(12);
        let calibrator = SampleMassCalibrator::new(&db, &ProcessingConfig::default());
        let mut sample = shifted_sample(12, 8.0);
        let report = calibrator.calibrate(&mut sample);
        assert!(report.corrected);
        // The shift keeps its first estimate, the spread is refreshed.
        assert!((sample.mass_shift_ppm.unwrap() - 8.0).abs() < 1e-3);
        assert!((sample.mass_stdev_ppm.unwrap() - 0.5).abs() < 1e-2);
        for (i, trace) in sample.traces.iter().enumerate() {
            let expected = 100.0 + 37.0 * i as f64;
            assert!((trace.mz() - expected).abs() / expected * 1e6 < 1.0);
        }
        for peak in sample.peaks.iter() {
            assert!((peak.mz - sample.traces[peak.trace_index].mz()).abs() < 1e-9);
        }
        assert_eq!(sample.mz_list[0], sample.traces[0].mz());
    }

    #[test]
    fn test_too_few_matches_marks_sample_invalid() {
        let db = reference(4);
        let calibrator = SampleMassCalibrator::new(&db, &ProcessingConfig::default());
        let mut sample = shifted_sample(4, 1.0);
        let report = calibrator.calibrate(&mut sample);
        assert_eq!(report.matches, 4);
        assert_eq!(
            sample.status,
            crate::models::SampleStatus::Invalid(InvalidReason::TooFewMassMatches {
                found: 4,
                required: 10
            })
        );
        assert!(sample.mass_shift_ppm.is_none());
    }
}
