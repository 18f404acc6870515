use super::aligner::{
    AlignmentOutcome,
    AnchorGuidedAligner,
};
use crate::models::Sample;
use serde::Serialize;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use tracing::{
    debug,
    info,
};

/// Experiment-wide m/z list that every aligned sample maps into.
///
/// Positions are stable: the list only grows, by appending. The first sample
/// added seeds the list and lends it its anchor pairs. Later samples add the
/// anchor pairs that landed on values they appended.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceGrid {
    mz_list: Vec<f64>,
    anchor_pairs: Vec<(usize, usize)>,
    /// Sample id to, for each of the sample's `mz_list` values, a grid position.
    sample_maps: BTreeMap<usize, Vec<usize>>,
    #[serde(skip)]
    aligner: AnchorGuidedAligner,
}

impl ReferenceGrid {
    pub fn new(aligner: AnchorGuidedAligner) -> Self {
        Self {
            mz_list: Vec::new(),
            anchor_pairs: Vec::new(),
            sample_maps: BTreeMap::new(),
            aligner,
        }
    }

    pub fn mz_list(&self) -> &[f64] {
        &self.mz_list
    }

    pub fn anchor_pairs(&self) -> &[(usize, usize)] {
        &self.anchor_pairs
    }

    pub fn len(&self) -> usize {
        self.mz_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz_list.is_empty()
    }

    pub fn sample_map(&self, sample_id: usize) -> Option<&[usize]> {
        self.sample_maps.get(&sample_id).map(|v| v.as_slice())
    }

    pub fn sample_maps(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.sample_maps
    }

    /// Grid m/z of the `position`-th value of a sample's `mz_list`.
    pub fn consensus_mz(&self, sample_id: usize, position: usize) -> Option<f64> {
        self.sample_maps
            .get(&sample_id)
            .and_then(|m| m.get(position))
            .and_then(|k| self.mz_list.get(*k).copied())
    }

    fn seed(&mut self, sample: &mut Sample) {
        info!(
            "Seeding the reference grid with sample {} ({} m/z values, {} anchor pairs)",
            sample.name,
            sample.mz_list.len(),
            sample.anchor_pairs.len()
        );
        self.mz_list = sample.mz_list.clone();
        self.anchor_pairs = sample.anchor_pairs.clone();
        self.sample_maps
            .insert(sample.id, (0..sample.mz_list.len()).collect());
        sample.mz_correction_ratio = Some(0.0);
    }

    /// Takes over the sample anchor pairs with at least one member at or past
    /// `appended_from` whose grid positions are not yet part of an anchor pair.
    fn adopt_anchor_pairs(
        &mut self,
        sample_name: &str,
        pairs: &[(usize, usize)],
        sample_map: &[usize],
        appended_from: usize,
    ) {
        let mut claimed: BTreeSet<usize> = self
            .anchor_pairs
            .iter()
            .flat_map(|(a, b)| [*a, *b])
            .collect();
        let before = self.anchor_pairs.len();
        for (i, j) in pairs {
            let (Some(&a), Some(&b)) = (sample_map.get(*i), sample_map.get(*j)) else {
                continue;
            };
            if (a < appended_from && b < appended_from)
                || a == b
                || claimed.contains(&a)
                || claimed.contains(&b)
            {
                continue;
            }
            claimed.insert(a);
            claimed.insert(b);
            self.anchor_pairs.push((a, b));
        }
        let adopted = self.anchor_pairs.len() - before;
        if adopted > 0 {
            debug!(
                "Sample {} added {} anchor pairs to the grid",
                sample_name, adopted
            );
        }
    }

    /// Maps `sample` into the grid, growing it by the values that found no match.
    ///
    /// An empty grid is seeded with the sample instead.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn add_sample(&mut self, sample: &mut Sample) {
        if self.is_empty() {
            self.seed(sample);
            return;
        }
        let AlignmentOutcome {
            reference_mz,
            sample_map,
            correction_ratio,
            drift_corrected,
            ..
        } = self.aligner.align(
            &self.mz_list,
            &self.anchor_pairs,
            &sample.mz_list,
            &sample.anchor_pairs,
        );
        if drift_corrected {
            info!(
                "Sample {} drifts {:.3} ppm from the reference grid, rescaled for alignment",
                sample.name,
                correction_ratio * 1e6
            );
        }
        let appended_from = self.mz_list.len();
        let grown = reference_mz.len() - appended_from;
        self.mz_list = reference_mz;
        self.adopt_anchor_pairs(&sample.name, &sample.anchor_pairs, &sample_map, appended_from);
        self.sample_maps.insert(sample.id, sample_map);
        sample.mz_correction_ratio = Some(correction_ratio);
        info!(
            "Aligned sample {}, grid grew by {} to {}",
            sample.name,
            grown,
            self.mz_list.len()
        );
    }
}
