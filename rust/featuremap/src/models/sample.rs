use super::mass_trace::MassTrace;
use super::peak::Peak;
use rtcurve::RtCurve;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidReason {
    TooFewMassMatches { found: usize, required: usize },
    TooFewRtAnchors { found: usize, required: usize },
    RtCurveFailed { msg: String },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::TooFewMassMatches { found, required } => write!(
                f,
                "{} reference mass matches, {} required",
                found, required
            ),
            InvalidReason::TooFewRtAnchors { found, required } => write!(
                f,
                "{} RT calibration peaks, {} required",
                found, required
            ),
            InvalidReason::RtCurveFailed { msg } => write!(f, "RT curve fit failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SampleStatus {
    Valid,
    Invalid(InvalidReason),
}

/// One input run.
///
/// `mz_list` is the ascending list of trace m/z values and `mz_order[i]` is the
/// trace behind `mz_list[i]`. Anchor pairs and grid maps index into `mz_list`.
/// An invalid sample keeps all of its data but is skipped by later stages.
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: usize,
    pub name: String,
    pub traces: Vec<MassTrace>,
    pub mz_list: Vec<f64>,
    pub mz_order: Vec<usize>,
    pub anchor_pairs: Vec<(usize, usize)>,
    pub peaks: Vec<Peak>,
    pub mass_shift_ppm: Option<f64>,
    pub mass_stdev_ppm: Option<f64>,
    /// mzstr to reference identity key.
    pub mz_identities: HashMap<String, String>,
    /// Drift ratio found by the aligner, kept for diagnostics.
    pub mz_correction_ratio: Option<f64>,
    pub rt_calibration: Option<RtCurve>,
    pub status: SampleStatus,
}

impl Sample {
    pub fn new(id: usize, name: impl Into<String>, traces: Vec<MassTrace>) -> Self {
        let mut sample = Self {
            id,
            name: name.into(),
            traces,
            mz_list: Vec::new(),
            mz_order: Vec::new(),
            anchor_pairs: Vec::new(),
            peaks: Vec::new(),
            mass_shift_ppm: None,
            mass_stdev_ppm: None,
            mz_identities: HashMap::new(),
            mz_correction_ratio: None,
            rt_calibration: None,
            status: SampleStatus::Valid,
        };
        sample.refresh_mz_list();
        sample
    }

    /// Rebuilds `mz_list` and `mz_order` from the current trace m/z values.
    pub fn refresh_mz_list(&mut self) {
        let mut order: Vec<usize> = (0..self.traces.len()).collect();
        order.sort_by(|a, b| self.traces[*a].mz().total_cmp(&self.traces[*b].mz()));
        self.mz_list = order.iter().map(|i| self.traces[*i].mz()).collect();
        self.mz_order = order;
    }

    /// Position in `mz_list` of every trace, indexed by trace.
    pub fn trace_positions(&self) -> Vec<usize> {
        let mut positions = vec![0; self.traces.len()];
        for (pos, trace_index) in self.mz_order.iter().enumerate() {
            positions[*trace_index] = pos;
        }
        positions
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.status, SampleStatus::Valid)
    }

    pub fn invalidate(&mut self, reason: InvalidReason) {
        self.status = SampleStatus::Invalid(reason);
    }

    /// Reference identity of a peak, if its trace was matched to the reference masses.
    pub fn identity_of(&self, peak: &Peak) -> Option<&str> {
        peak.mzstr
            .as_ref()
            .and_then(|k| self.mz_identities.get(k))
            .map(|s| s.as_str())
    }

    pub fn max_rtime(&self) -> Option<f64> {
        self.traces
            .iter()
            .filter_map(|t| t.max_time())
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
    }
}

/// Per-sample numbers worth reporting once a run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSummary {
    pub name: String,
    pub status: SampleStatus,
    pub number_traces: usize,
    pub number_peaks: usize,
    pub number_anchor_pairs: usize,
    pub mass_shift_ppm: Option<f64>,
    pub mass_stdev_ppm: Option<f64>,
    pub mz_correction_ratio: Option<f64>,
    pub rt_calibrated: bool,
}

impl From<&Sample> for SampleSummary {
    fn from(s: &Sample) -> Self {
        Self {
            name: s.name.clone(),
            status: s.status.clone(),
            number_traces: s.traces.len(),
            number_peaks: s.peaks.len(),
            number_anchor_pairs: s.anchor_pairs.len(),
            mass_shift_ppm: s.mass_shift_ppm,
            mass_stdev_ppm: s.mass_stdev_ppm,
            mz_correction_ratio: s.mz_correction_ratio,
            rt_calibrated: s.rt_calibration.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(id: usize, mz: f64) -> MassTrace {
        MassTrace::try_new(id, mz, vec![0.0, 1.0, 2.0], vec![1.0, 3.0, 1.0]).unwrap()
    }

    #[test]
    fn test_mz_list_is_ascending_and_positions_invert_order() {
        let sample = Sample::new(0, "a", vec![trace(0, 300.0), trace(1, 100.0), trace(2, 200.0)]);
        assert_eq!(sample.mz_list, vec![100.0, 200.0, 300.0]);
        assert_eq!(sample.mz_order, vec![1, 2, 0]);
        assert_eq!(sample.trace_positions(), vec![2, 0, 1]);
        assert_eq!(sample.max_rtime(), Some(2.0));
    }

    #[test]
    fn test_summary_serializes_status() {
        let mut sample = Sample::new(0, "a", vec![]);
        sample.invalidate(InvalidReason::TooFewRtAnchors {
            found: 3,
            required: 50,
        });
        let json = serde_json::to_string(&SampleSummary::from(&sample)).unwrap();
        assert!(json.contains("too_few_rt_anchors"));
        assert!(!sample.is_valid());
    }
}
