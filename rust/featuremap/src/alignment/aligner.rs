use crate::config::ProcessingConfig;
use crate::matching::{
    MzMatches,
    complete_mass_paired_mapping,
    mass_paired_mapping,
};
use tracing::debug;

/// Output of aligning one sample against the reference list.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOutcome {
    /// The reference list extended with the sample's unmatched values.
    pub reference_mz: Vec<f64>,
    /// For every reference position, the sample index it resolves to.
    pub positions: Vec<Option<usize>>,
    /// For every sample index, its reference position.
    pub sample_map: Vec<usize>,
    /// Estimated drift ratio of the sample against the reference.
    pub correction_ratio: f64,
    /// Whether the sample list was rescaled by `1 / (1 + correction_ratio)`.
    pub drift_corrected: bool,
}

/// Aligns m/z lists using isotope anchor pairs first.
///
/// Anchor first members are matched at `max_drift_ppm` to estimate a systematic
/// drift, which is removed once when it exceeds `correction_tolerance_ppm`.
/// First and second members are then matched at `std_ppm`, and whatever is left
/// on both sides goes through the complete matcher at `std_ppm`. Unmatched sample
/// values are appended to the reference in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGuidedAligner {
    pub std_ppm: f64,
    pub correction_tolerance_ppm: f64,
    pub max_drift_ppm: f64,
}

impl From<&ProcessingConfig> for AnchorGuidedAligner {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            std_ppm: config.std_ppm,
            correction_tolerance_ppm: config.correction_tolerance_ppm,
            max_drift_ppm: config.max_mz_drift_ppm,
        }
    }
}

fn member_values(mz: &[f64], pairs: &[(usize, usize)], second: bool) -> Vec<f64> {
    pairs
        .iter()
        .map(|(a, b)| if second { mz[*b] } else { mz[*a] })
        .collect()
}

/// Records `pairs` whose two sides are both still free.
fn claim(
    pairs: Vec<(usize, usize)>,
    ref_claimed: &mut [bool],
    sample_claimed: &mut [bool],
    mapped: &mut Vec<(usize, usize)>,
) {
    for (r, s) in pairs {
        if ref_claimed[r] || sample_claimed[s] {
            continue;
        }
        ref_claimed[r] = true;
        sample_claimed[s] = true;
        mapped.push((r, s));
    }
}

impl AnchorGuidedAligner {
    fn match_members(
        &self,
        reference_mz: &[f64],
        reference_anchors: &[(usize, usize)],
        sample_mz: &[f64],
        sample_anchors: &[(usize, usize)],
        second: bool,
        ppm: f64,
    ) -> (MzMatches, Vec<(usize, usize)>) {
        let ref_values = member_values(reference_mz, reference_anchors, second);
        let sample_values = member_values(sample_mz, sample_anchors, second);
        let matches = mass_paired_mapping(&ref_values, &sample_values, ppm);
        let pick = |pair: &(usize, usize)| if second { pair.1 } else { pair.0 };
        let translated = matches
            .matched
            .iter()
            .map(|(p, q)| (pick(&reference_anchors[*p]), pick(&sample_anchors[*q])))
            .collect();
        (matches, translated)
    }

    /// Aligns `sample_mz` against `reference_mz`.
    ///
    /// Anchor pairs index into their own list. Neither input needs to be sorted.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn align(
        &self,
        reference_mz: &[f64],
        reference_anchors: &[(usize, usize)],
        sample_mz: &[f64],
        sample_anchors: &[(usize, usize)],
    ) -> AlignmentOutcome {
        let (loose, _) = self.match_members(
            reference_mz,
            reference_anchors,
            sample_mz,
            sample_anchors,
            false,
            self.max_drift_ppm,
        );
        // residual = (ref - sample) / ref, so a sample reading high gives a positive ratio.
        let correction_ratio = -loose.mean_residual_ratio();
        let drift_corrected = correction_ratio.abs() > self.correction_tolerance_ppm * 1e-6;
        let corrected: Vec<f64> = if drift_corrected {
            sample_mz.iter().map(|m| m / (1.0 + correction_ratio)).collect()
        } else {
            sample_mz.to_vec()
        };

        let mut ref_claimed = vec![false; reference_mz.len()];
        let mut sample_claimed = vec![false; corrected.len()];
        let mut mapped: Vec<(usize, usize)> = Vec::new();

        for second in [false, true] {
            let (_, pairs) = self.match_members(
                reference_mz,
                reference_anchors,
                &corrected,
                sample_anchors,
                second,
                self.std_ppm,
            );
            claim(pairs, &mut ref_claimed, &mut sample_claimed, &mut mapped);
        }
        let anchored = mapped.len();

        let ref_rest: Vec<usize> = (0..reference_mz.len()).filter(|k| !ref_claimed[*k]).collect();
        let sample_rest: Vec<usize> = (0..corrected.len()).filter(|k| !sample_claimed[*k]).collect();
        let ref_values: Vec<f64> = ref_rest.iter().map(|k| reference_mz[*k]).collect();
        let sample_values: Vec<f64> = sample_rest.iter().map(|k| corrected[*k]).collect();
        let rest = complete_mass_paired_mapping(&ref_values, &sample_values, self.std_ppm);
        claim(
            rest.matches
                .matched
                .iter()
                .map(|(p, q)| (ref_rest[*p], sample_rest[*q]))
                .collect(),
            &mut ref_claimed,
            &mut sample_claimed,
            &mut mapped,
        );

        let unmatched: Vec<usize> = rest.unmatched_b.iter().map(|q| sample_rest[*q]).collect();
        debug!(
            "Aligned {} values: {} through anchors, {} by m/z, {} appended (drift {:.3} ppm)",
            corrected.len(),
            anchored,
            mapped.len() - anchored,
            unmatched.len(),
            correction_ratio * 1e6
        );

        let mut positions: Vec<Option<usize>> = vec![None; reference_mz.len()];
        let mut sample_map = vec![0; corrected.len()];
        for (r, s) in mapped.iter() {
            positions[*r] = Some(*s);
            sample_map[*s] = *r;
        }
        let mut new_reference = reference_mz.to_vec();
        for s in unmatched {
            sample_map[s] = new_reference.len();
            positions.push(Some(s));
            new_reference.push(corrected[s]);
        }

        AlignmentOutcome {
            reference_mz: new_reference,
            positions,
            sample_map,
            correction_ratio,
            drift_corrected,
        }
    }
}
