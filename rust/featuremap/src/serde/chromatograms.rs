use crate::config::ProcessingConfig;
use crate::errors::DataReadingError;
use crate::models::{
    MassTrace,
    Sample,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{
    debug,
    info,
};

/// One extracted ion chromatogram as handed over by a raw file reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrace {
    pub mz: f64,
    /// Positions in the run's time axis.
    pub time_indices: Vec<usize>,
    pub intensities: Vec<f64>,
}

/// Mass traces of one run, with the shared time axis they index into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChromatograms {
    pub time_axis: Vec<f64>,
    #[serde(default)]
    pub scans: Vec<i64>,
    pub traces: Vec<RawTrace>,
}

/// Minimum requirements for a raw trace to become a [`MassTrace`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceAdmission {
    pub min_timepoints: usize,
    pub min_intensity: f64,
}

impl From<&ProcessingConfig> for TraceAdmission {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            min_timepoints: config.min_timepoints,
            min_intensity: config.min_intensity,
        }
    }
}

impl RawChromatograms {
    /// Builds the traces that pass `admission`. Traces that don't are skipped.
    ///
    /// Traces sharing an [`MassTrace::mzstr`] key are collapsed into the one with
    /// the larger total intensity, which takes the place of the first one seen.
    pub fn into_traces(self, admission: TraceAdmission) -> Vec<MassTrace> {
        let total = self.traces.len();
        let mut traces: Vec<MassTrace> = Vec::with_capacity(total);
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for (id, raw) in self.traces.into_iter().enumerate() {
            if raw.time_indices.len() < admission.min_timepoints {
                continue;
            }
            let max_intensity = raw.intensities.iter().cloned().fold(f64::MIN, f64::max);
            if max_intensity < admission.min_intensity {
                continue;
            }
            let times: Option<Vec<f64>> = raw
                .time_indices
                .iter()
                .map(|i| self.time_axis.get(*i).copied())
                .collect();
            let Some(times) = times else {
                debug!(
                    "Skipping trace {} at m/z {}: time index outside the axis of {} points",
                    id,
                    raw.mz,
                    self.time_axis.len()
                );
                continue;
            };
            let trace = match MassTrace::try_new(id, raw.mz, times, raw.intensities) {
                Ok(trace) => trace,
                Err(e) => {
                    debug!("Skipping trace {} at m/z {}: {}", id, raw.mz, e);
                    continue;
                }
            };
            let key = trace.mzstr();
            match by_key.get(&key) {
                Some(&slot) => {
                    let kept = &mut traces[slot];
                    debug!(
                        "Traces {} and {} share m/z {}, keeping the more intense one",
                        kept.id, trace.id, key
                    );
                    if trace.total_intensity() > kept.total_intensity() {
                        *kept = trace;
                    }
                }
                None => {
                    by_key.insert(key, traces.len());
                    traces.push(trace);
                }
            }
        }
        debug!("Admitted {} of {} traces", traces.len(), total);
        traces
    }
}

/// Source of the raw chromatograms of one run.
pub trait ChromatogramReader: Sync {
    fn read(&self, path: &Path) -> Result<RawChromatograms, DataReadingError>;
}

/// Reads chromatograms stored as a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonChromatogramReader;

impl ChromatogramReader for JsonChromatogramReader {
    fn read(&self, path: &Path) -> Result<RawChromatograms, DataReadingError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| DataReadingError::FileReadingError {
                source: e,
                path: path.to_path_buf(),
            })?;
        serde_json::from_str(&content).map_err(|e| DataReadingError::JsonParsingError {
            source: e,
            path: path.to_path_buf(),
        })
    }
}

/// Reads one run into a [`Sample`] named after the file stem.
pub fn load_sample(
    reader: &dyn ChromatogramReader,
    path: &Path,
    id: usize,
    admission: TraceAdmission,
) -> Result<Sample, DataReadingError> {
    let raw = reader.read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("sample_{}", id));
    let traces = raw.into_traces(admission);
    info!("Loaded {} traces from {}", traces.len(), path.display());
    Ok(Sample::new(id, name, traces))
}
