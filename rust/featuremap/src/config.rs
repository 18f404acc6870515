use crate::errors::{
    FeatureMapError,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Every tunable of the processing pipeline.
///
/// All fields have defaults, so a config file only needs to name the
/// values it changes:
/// ```
/// use featuremap::ProcessingConfig;
///
/// let config: ProcessingConfig = serde_json::from_str(r#"{"snr": 3.0}"#).unwrap();
/// assert_eq!(config.snr, 3.0);
/// assert_eq!(config.std_ppm, 5.0);
/// ```
///
/// Retention times are in whatever unit the input time axis uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Mass accuracy assumed for the experiment when no sample could be mass calibrated.
    pub mz_tolerance_ppm: f64,
    /// Traces whose maximum intensity is below this are dropped; also the peak height floor.
    pub min_intensity: f64,
    /// Minimum number of points for a trace to be kept.
    pub min_timepoints: usize,
    /// Minimum peak width at half prominence, in number of points.
    pub min_peak_width: f64,
    pub min_prominence: f64,
    /// Window (in points) used to look for prominence bases. `None` searches the whole trace.
    pub prominence_window: Option<usize>,
    pub snr: f64,
    /// Minimum goodness of fit of the Gaussian model for a peak to be accepted.
    pub gaussian_shape_threshold: f64,
    /// Re-run detection with a prominence of 10% of the trace max when the first pass
    /// finds more than one peak.
    pub stricter_rerun: bool,

    /// Tolerance used for anchor matching, remainder matching and selectivity.
    pub std_ppm: f64,
    /// Drift (mean anchor residual) above which a sample's m/z list is rescaled.
    pub correction_tolerance_ppm: f64,
    /// Widest drift the aligner tries to estimate. Anchors further apart than this
    /// are never paired, so larger drifts go undetected.
    pub max_mz_drift_ppm: f64,

    /// Tolerance of the reference mass search.
    pub mass_accuracy_check_ppm: f64,
    /// Mass shift above which every m/z in a sample is corrected.
    pub mass_shift_correction_ppm: f64,
    /// Samples with fewer reference mass matches are marked invalid.
    pub min_mass_calibration_matches: usize,

    /// Maximum retention time gap between peaks merged into one feature.
    pub rtime_tolerance: f64,
    pub rt_align_on: bool,
    /// Samples with fewer RT anchor peaks are marked invalid.
    pub peak_number_rt_calibration: usize,
    /// Upper end of the retention time axis. Defaults to the largest time observed.
    pub max_rtime: Option<f64>,
    pub rt_grid_size: usize,

    /// Names of the samples used to seed the reference grid.
    /// Defaults to the first three samples in input order.
    pub initiation_samples: Option<Vec<String>>,
    /// Maximum apex separation for two traces to form an isotope anchor pair.
    pub isotope_anchor_rtime_tolerance: f64,

    pub high_quality_min_peak_quality: f64,
    pub high_quality_min_presence: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mz_tolerance_ppm: 5.0,
            min_intensity: 1000.0,
            min_timepoints: 6,
            min_peak_width: 1.0,
            min_prominence: 10000.0,
            prominence_window: Some(30),
            snr: 2.0,
            gaussian_shape_threshold: 0.8,
            stricter_rerun: true,
            std_ppm: 5.0,
            correction_tolerance_ppm: 1.0,
            max_mz_drift_ppm: 20.0,
            mass_accuracy_check_ppm: 10.0,
            mass_shift_correction_ppm: 5.0,
            min_mass_calibration_matches: 10,
            rtime_tolerance: 50.0,
            rt_align_on: true,
            peak_number_rt_calibration: 20,
            max_rtime: None,
            rt_grid_size: 100,
            initiation_samples: None,
            isotope_anchor_rtime_tolerance: 10.0,
            high_quality_min_peak_quality: 0.8,
            high_quality_min_presence: 0.15,
        }
    }
}

/// Number of samples used to seed the grid when none are named.
pub const DEFAULT_INITIATION_SAMPLES: usize = 3;

impl ProcessingConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("mz_tolerance_ppm", self.mz_tolerance_ppm),
            ("std_ppm", self.std_ppm),
            ("mass_accuracy_check_ppm", self.mass_accuracy_check_ppm),
            ("max_mz_drift_ppm", self.max_mz_drift_ppm),
            ("rtime_tolerance", self.rtime_tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(FeatureMapError::Config {
                    msg: format!("{} must be a positive number, got {}", name, value),
                });
            }
        }
        if self.max_mz_drift_ppm < self.std_ppm {
            return Err(FeatureMapError::Config {
                msg: format!(
                    "max_mz_drift_ppm ({}) cannot be tighter than std_ppm ({})",
                    self.max_mz_drift_ppm, self.std_ppm
                ),
            });
        }
        if self.rt_grid_size < 2 {
            return Err(FeatureMapError::Config {
                msg: "rt_grid_size must be at least 2".to_string(),
            });
        }
        if let Some(max_rtime) = self.max_rtime {
            if !(max_rtime > 0.0) {
                return Err(FeatureMapError::Config {
                    msg: format!("max_rtime must be positive, got {}", max_rtime),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProcessingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mass_accuracy_check_ppm, 10.0);
        assert_eq!(config.gaussian_shape_threshold, 0.8);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ProcessingConfig =
            serde_json::from_str(r#"{"peak_number_rt_calibration": 50, "max_rtime": 1200.0}"#)
                .unwrap();
        assert_eq!(config.peak_number_rt_calibration, 50);
        assert_eq!(config.max_rtime, Some(1200.0));
        assert_eq!(config.min_timepoints, 6);
    }

    #[test]
    fn test_rejects_drift_limit_below_matching_tolerance() {
        let config = ProcessingConfig {
            max_mz_drift_ppm: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FeatureMapError::Config { .. })
        ));
    }
}
