use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

/// Experiment-wide aggregate of the peaks resolved to one chemical signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub mass_id: String,
    pub mz: f64,
    pub rtime: f64,
    pub rt_min: f64,
    pub rt_max: f64,
    pub number_peaks: usize,
    pub peak_quality_max: f64,
    pub peak_quality_median: f64,
    pub intensity_mean: f64,
    pub selectivity_mz: f64,
    /// Fraction of the valid samples that contribute a peak.
    pub presence: f64,
    pub per_sample_intensity: BTreeMap<String, f64>,
}

impl Feature {
    pub fn is_high_quality(&self, min_peak_quality: f64, min_presence: f64) -> bool {
        self.peak_quality_max > min_peak_quality && self.presence > min_presence
    }
}

/// Splits features into the high quality tier and the rest, keeping their order.
pub fn split_by_quality(
    features: &[Feature],
    min_peak_quality: f64,
    min_presence: f64,
) -> (Vec<&Feature>, Vec<&Feature>) {
    features
        .iter()
        .partition(|f| f.is_high_quality(min_peak_quality, min_presence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(quality: f64, presence: f64) -> Feature {
        Feature {
            id: "F1".into(),
            mass_id: "x".into(),
            mz: 100.0,
            rtime: 10.0,
            rt_min: 9.0,
            rt_max: 11.0,
            number_peaks: 1,
            peak_quality_max: quality,
            peak_quality_median: quality,
            intensity_mean: 1.0,
            selectivity_mz: 1.0,
            presence,
            per_sample_intensity: BTreeMap::new(),
        }
    }

    #[test]
    fn test_quality_split_is_strict() {
        let features = vec![
            feature(0.95, 0.5),
            feature(0.8, 0.5),
            feature(0.95, 0.15),
            feature(0.81, 0.16),
        ];
        let (high, rest) = split_by_quality(&features, 0.8, 0.15);
        assert_eq!(high.len(), 2);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].peak_quality_max, 0.8);
    }
}
