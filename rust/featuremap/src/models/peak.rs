use crate::peak_model::{
    FitOutcome,
    GaussianParams,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Apex and base times after retention time calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedTimes {
    pub apex: f64,
    pub left: f64,
    pub right: f64,
}

/// One chromatographic peak on a mass trace.
///
/// The parent trace is referenced by its position in the owning sample's trace
/// list; the three indices point into that trace's time and intensity sequences
/// and satisfy `left_base_index <= apex_index <= right_base_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peak {
    pub id: usize,
    pub trace_index: usize,
    pub mz: f64,
    pub apex_index: usize,
    pub left_base_index: usize,
    pub right_base_index: usize,
    pub height: f64,
    pub fit: FitOutcome,
    /// Apex time from the fit (or the trace time at the apex when the fit failed).
    pub retention_time: f64,
    pub left_rtime: f64,
    pub right_rtime: f64,
    pub calibrated: Option<CalibratedTimes>,
    pub selectivity: f64,
    pub mzstr: Option<String>,
}

impl Peak {
    pub fn gaussian_params(&self) -> &GaussianParams {
        self.fit.params()
    }

    pub fn area(&self) -> f64 {
        self.fit.area()
    }

    pub fn goodness_of_fit(&self) -> f64 {
        self.fit.goodness_of_fit()
    }

    /// Calibrated apex time when available, raw otherwise.
    pub fn rtime(&self) -> f64 {
        self.calibrated
            .map(|c| c.apex)
            .unwrap_or(self.retention_time)
    }

    pub fn rt_bounds(&self) -> (f64, f64) {
        match self.calibrated {
            Some(c) => (c.left, c.right),
            None => (self.left_rtime, self.right_rtime),
        }
    }
}
