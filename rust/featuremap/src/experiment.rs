use crate::alignment::{
    AnchorGuidedAligner,
    ReferenceGrid,
    process_and_align,
};
use crate::anchors::assign_anchor_pairs;
use crate::config::{
    DEFAULT_INITIATION_SAMPLES,
    ProcessingConfig,
};
use crate::correspondence::CorrespondenceBuilder;
use crate::detection::{
    DetectionParams,
    TracePeakDetector,
};
use crate::errors::Result;
use crate::mass_calibration::SampleMassCalibrator;
use crate::models::{
    Feature,
    Sample,
    SampleSummary,
};
use crate::reference_masses::FormulaMassDatabase;
use crate::rt_calibration::{
    RTCalibrator,
    anchor_times,
    reference_times,
    required_presence,
};
use crate::selectivity::calculate_selectivity;
use crate::utils::stats::median;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{
    info,
    warn,
};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct ExperimentResult {
    /// Every sample, valid or not, in input order.
    pub samples: Vec<Sample>,
    pub grid: ReferenceGrid,
    pub features: Vec<Feature>,
    /// Mass spread used to bin unidentified peaks.
    pub mass_stdev_ppm: f64,
}

impl ExperimentResult {
    pub fn summaries(&self) -> Vec<SampleSummary> {
        self.samples.iter().map(SampleSummary::from).collect()
    }

    pub fn valid_sample_names(&self) -> Vec<String> {
        self.samples
            .iter()
            .filter(|s| s.is_valid())
            .map(|s| s.name.clone())
            .collect()
    }
}

/// Runs the full processing chain over a set of samples.
pub struct Experiment<'a> {
    config: ProcessingConfig,
    detector: TracePeakDetector,
    db: Option<&'a dyn FormulaMassDatabase>,
}

impl<'a> Experiment<'a> {
    pub fn new(config: ProcessingConfig, db: Option<&'a dyn FormulaMassDatabase>) -> Result<Self> {
        config.validate()?;
        let detector = TracePeakDetector::new(DetectionParams::from(&config));
        Ok(Self {
            config,
            detector,
            db,
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Per-sample work with no dependency on other samples: peak detection,
    /// selectivity, mass calibration and anchor pairs.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn process_sample(&self, mut sample: Sample) -> Sample {
        let selectivity = calculate_selectivity(&sample.mz_list, self.config.std_ppm);
        let mut trace_selectivity = vec![1.0; sample.traces.len()];
        for (pos, trace_index) in sample.mz_order.iter().enumerate() {
            trace_selectivity[*trace_index] = selectivity[pos];
        }

        let mut peaks = Vec::new();
        for (trace_index, trace) in sample.traces.iter().enumerate() {
            let mut found = self.detector.detect(trace, trace_index, peaks.len());
            for peak in found.iter_mut() {
                peak.selectivity = trace_selectivity[trace_index];
                peak.mzstr = Some(trace.mzstr());
            }
            peaks.extend(found);
        }
        info!(
            "Sample {}: {} peaks on {} traces",
            sample.name,
            peaks.len(),
            sample.traces.len()
        );
        sample.peaks = peaks;

        if let Some(db) = self.db {
            SampleMassCalibrator::new(db, &self.config).calibrate(&mut sample);
        }
        assign_anchor_pairs(
            &mut sample,
            self.config.std_ppm,
            self.config.isotope_anchor_rtime_tolerance,
        );
        sample
    }

    /// Indices of the samples that seed the reference grid.
    pub fn initiation_indices(&self, samples: &[Sample]) -> Vec<usize> {
        match self.config.initiation_samples.as_ref() {
            Some(names) if !names.is_empty() => {
                let mut indices = Vec::new();
                for name in names {
                    match samples.iter().position(|s| &s.name == name) {
                        Some(i) if !indices.contains(&i) => indices.push(i),
                        Some(_) => {}
                        None => warn!("Initiation sample {} is not among the inputs", name),
                    }
                }
                indices
            }
            _ => (0..samples.len().min(DEFAULT_INITIATION_SAMPLES)).collect(),
        }
    }

    /// Median mass spread of the valid samples, or the configured tolerance.
    pub fn experiment_mass_stdev(&self, samples: &[Sample]) -> f64 {
        let spreads: Vec<f64> = samples
            .iter()
            .filter(|s| s.is_valid())
            .filter_map(|s| s.mass_stdev_ppm)
            .filter(|s| *s > 0.0)
            .collect();
        median(&spreads).unwrap_or(self.config.mz_tolerance_ppm)
    }

    /// Samples stay uncalibrated, and valid, when no identity qualifies as an anchor.
    fn calibrate_retention_times(&self, samples: &mut [Sample]) {
        let per_sample: Vec<BTreeMap<String, f64>> = samples
            .par_iter()
            .filter(|s| s.is_valid())
            .map(anchor_times)
            .collect();
        let min_presence = required_presence(per_sample.len());
        let reference = reference_times(&per_sample, min_presence);
        if reference.is_empty() {
            warn!("No identity anchors any sample, retention times stay uncalibrated");
            return;
        }
        info!(
            "{} identities anchor the RT calibration (present in at least {} samples)",
            reference.len(),
            min_presence
        );

        let calibrator = RTCalibrator::from(&self.config);
        samples
            .par_iter_mut()
            .filter(|s| s.is_valid())
            .for_each(|s| calibrator.calibrate(s, &reference));
    }

    /// Processes, aligns, calibrates and groups `samples`.
    ///
    /// Sample ids are reassigned to the input order.
    pub fn run(&self, mut samples: Vec<Sample>) -> Result<ExperimentResult> {
        for (id, s) in samples.iter_mut().enumerate() {
            s.id = id;
        }
        let init = self.initiation_indices(&samples);
        let mut initiation = Vec::with_capacity(init.len());
        let mut rest = Vec::with_capacity(samples.len());
        for (i, s) in samples.into_iter().enumerate() {
            if init.contains(&i) {
                initiation.push(s);
            } else {
                rest.push(s);
            }
        }
        info!(
            "Processing {} initiation samples, then {} more",
            initiation.len(),
            rest.len()
        );

        let mut grid = ReferenceGrid::new(AnchorGuidedAligner::from(&self.config));
        let mut initiation: Vec<Sample> = initiation
            .into_par_iter()
            .map(|s| self.process_sample(s))
            .collect();
        // Largest valid initiation sample first, the others in input order.
        let seed = initiation
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_valid())
            .max_by(|(ia, a), (ib, b)| a.mz_list.len().cmp(&b.mz_list.len()).then(ib.cmp(ia)))
            .map(|(i, _)| i);
        if let Some(i) = seed {
            initiation[..=i].rotate_right(1);
        }
        for s in initiation.iter_mut().filter(|s| s.is_valid()) {
            grid.add_sample(s);
        }

        let mut all = initiation;
        all.extend(process_and_align(&mut grid, rest, |s| self.process_sample(s)));
        all.sort_by_key(|s| s.id);

        let valid = all.iter().filter(|s| s.is_valid()).count();
        info!(
            "{} of {} samples valid after mass calibration, grid holds {} m/z values",
            valid,
            all.len(),
            grid.len()
        );

        let mass_stdev_ppm = self.experiment_mass_stdev(&all);
        match (self.config.rt_align_on, self.db) {
            (true, Some(_)) => self.calibrate_retention_times(&mut all),
            (true, None) => warn!("No reference masses, retention times stay uncalibrated"),
            (false, _) => {}
        }

        let features = CorrespondenceBuilder::new(&self.config, mass_stdev_ppm).build(&all, Some(&grid));
        Ok(ExperimentResult {
            samples: all,
            grid,
            features,
            mass_stdev_ppm,
        })
    }
}
