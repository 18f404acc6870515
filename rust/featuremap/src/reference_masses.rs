use crate::matching::ppm_delta;
use serde::{
    Deserialize,
    Serialize,
};

/// Best reference hit for an observed m/z.
#[derive(Debug, Clone, PartialEq)]
pub struct MassMatch<'a> {
    pub identity_key: &'a str,
    /// `(observed - reference) / reference * 1e6`.
    pub delta_ppm: f64,
}

/// Lookup of observed m/z values in a list of known masses.
pub trait FormulaMassDatabase: Sync {
    /// Closest entry within `tolerance_ppm` of `mz`, if any.
    fn search(&self, mz: f64, tolerance_ppm: f64) -> Option<MassMatch<'_>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMass {
    pub identity: String,
    pub mz: f64,
}

/// In-memory reference masses, kept sorted by m/z.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMassList {
    entries: Vec<ReferenceMass>,
}

impl ReferenceMassList {
    pub fn new(mut entries: Vec<ReferenceMass>) -> Self {
        entries.retain(|e| e.mz.is_finite() && e.mz > 0.0);
        entries.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of the entries within `tolerance_ppm` of `mz`.
    fn window(&self, mz: f64, tolerance_ppm: f64) -> std::ops::Range<usize> {
        let tol = mz * tolerance_ppm * 1e-6;
        let lo = self.entries.partition_point(|e| e.mz < mz - tol);
        let hi = self.entries.partition_point(|e| e.mz <= mz + tol);
        lo..hi.max(lo)
    }
}

impl FormulaMassDatabase for ReferenceMassList {
    fn search(&self, mz: f64, tolerance_ppm: f64) -> Option<MassMatch<'_>> {
        if !(mz.is_finite() && tolerance_ppm > 0.0) {
            return None;
        }
        self.entries[self.window(mz, tolerance_ppm)]
            .iter()
            .map(|e| (e, ppm_delta(mz, e.mz)))
            .filter(|(_, d)| d.abs() <= tolerance_ppm)
            .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(e, delta_ppm)| MassMatch {
                identity_key: e.identity.as_str(),
                delta_ppm,
            })
    }
}
