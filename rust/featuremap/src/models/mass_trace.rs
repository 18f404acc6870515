use crate::errors::DataProcessingError;
use serde::{
    Deserialize,
    Serialize,
};

/// Intensity over retention time at one m/z.
///
/// `times` is strictly increasing and as long as `intensities`. The only field
/// written after construction is the calibrated m/z, set once by mass calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassTrace {
    pub id: usize,
    mz: f64,
    calibrated_mz: Option<f64>,
    times: Vec<f64>,
    intensities: Vec<f64>,
}

impl MassTrace {
    pub fn try_new(
        id: usize,
        mz: f64,
        times: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Result<Self, DataProcessingError> {
        if times.len() != intensities.len() {
            return Err(DataProcessingError::ExpectedSlicesSameLength {
                expected: times.len(),
                other: intensities.len(),
                context: format!("times and intensities of trace {}", id),
            });
        }
        if !mz.is_finite() || intensities.iter().any(|x| !x.is_finite()) {
            return Err(DataProcessingError::ExpectedFiniteNonNanData {
                context: format!("trace {} at m/z {}", id, mz),
            });
        }
        if times.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(DataProcessingError::ExpectedStrictlyIncreasing {
                context: format!("times of trace {}", id),
            });
        }
        Ok(Self {
            id,
            mz,
            calibrated_mz: None,
            times,
            intensities,
        })
    }

    /// Calibrated m/z if mass calibration ran, the raw m/z otherwise.
    pub fn mz(&self) -> f64 {
        self.calibrated_mz.unwrap_or(self.mz)
    }

    pub fn raw_mz(&self) -> f64 {
        self.mz
    }

    pub fn calibrated_mz(&self) -> Option<f64> {
        self.calibrated_mz
    }

    /// Records the calibrated m/z. Only the first call has an effect.
    pub fn set_calibrated_mz(&mut self, mz: f64) -> bool {
        if self.calibrated_mz.is_some() {
            return false;
        }
        self.calibrated_mz = Some(mz);
        true
    }

    /// Stable string key of the trace, built from the raw m/z.
    pub fn mzstr(&self) -> String {
        format!("{:.6}", self.mz)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn max_intensity(&self) -> f64 {
        self.intensities.iter().cloned().fold(0.0, f64::max)
    }

    pub fn total_intensity(&self) -> f64 {
        self.intensities.iter().sum()
    }

    pub fn max_time(&self) -> Option<f64> {
        self.times.last().copied()
    }
}
