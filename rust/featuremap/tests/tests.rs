use featuremap::models::InvalidReason;
use featuremap::serde::{
    RawChromatograms,
    RawTrace,
    TraceAdmission,
};
use featuremap::{
    AnchorGuidedAligner,
    Experiment,
    MassTrace,
    ProcessingConfig,
    ReferenceMass,
    ReferenceMassList,
    Sample,
    SampleStatus,
    TracePeakDetector,
};

const TIME_POINTS: usize = 601;
const IDENTITIES: usize = 60;

struct Species {
    mz: f64,
    rt: f64,
    amplitude: f64,
}

fn identity_mz(k: usize) -> f64 {
    150.0 + 13.7 * k as f64
}

fn identity_rt(k: usize) -> f64 {
    30.0 + 8.0 * k as f64
}

/// Every identity, with a 13C satellite on every fifth one.
fn full_species() -> Vec<Species> {
    let mut species = Vec::new();
    for k in 0..IDENTITIES {
        species.push(Species {
            mz: identity_mz(k),
            rt: identity_rt(k),
            amplitude: 1e5,
        });
        if k % 5 == 0 {
            species.push(Species {
                mz: identity_mz(k) + 1.003_355,
                rt: identity_rt(k),
                amplitude: 3e4,
            });
        }
    }
    species
}

fn raw_run(species: &[Species], mz_shift_ppm: f64, rt_scale: f64) -> RawChromatograms {
    let time_axis: Vec<f64> = (0..TIME_POINTS).map(|i| i as f64).collect();
    let traces = species
        .iter()
        .enumerate()
        .map(|(k, sp)| {
            let jitter = if k % 2 == 0 { 1.0 } else { -1.0 };
            let mz = sp.mz * (1.0 + (mz_shift_ppm + jitter) * 1e-6);
            let apex = sp.rt * rt_scale;
            let lo = (apex - 25.0).max(0.0) as usize;
            let hi = ((apex + 25.0) as usize).min(TIME_POINTS - 1);
            let time_indices: Vec<usize> = (lo..=hi).collect();
            let intensities = time_indices
                .iter()
                .map(|i| sp.amplitude * (-(*i as f64 - apex).powi(2) / 18.0).exp() + 50.0)
                .collect();
            RawTrace {
                mz,
                time_indices,
                intensities,
            }
        })
        .collect();
    RawChromatograms {
        time_axis,
        scans: (0..TIME_POINTS as i64).collect(),
        traces,
    }
}

fn reference_list() -> ReferenceMassList {
    ReferenceMassList::new(
        (0..IDENTITIES)
            .map(|k| ReferenceMass {
                identity: format!("ID{}", k),
                mz: identity_mz(k),
            })
            .collect(),
    )
}

fn config() -> ProcessingConfig {
    ProcessingConfig {
        min_mass_calibration_matches: 3,
        peak_number_rt_calibration: 50,
        ..Default::default()
    }
}

/// Three complete runs and a fourth one with only three known compounds.
fn samples(config: &ProcessingConfig) -> Vec<Sample> {
    let admission = TraceAdmission::from(config);
    let mut sparse: Vec<Species> = (0..3)
        .map(|k| Species {
            mz: identity_mz(k),
            rt: identity_rt(k),
            amplitude: 1e5,
        })
        .collect();
    sparse.extend((0..20).map(|j| Species {
        mz: 1000.0 + 7.3 * j as f64,
        rt: 100.0 + 15.0 * j as f64,
        amplitude: 1e5,
    }));

    let runs = vec![
        ("A", raw_run(&full_species(), 0.0, 1.0)),
        ("B", raw_run(&full_species(), 3.0, 1.02)),
        ("C", raw_run(&full_species(), 7.0, 0.99)),
        ("D", raw_run(&sparse, 0.0, 1.0)),
    ];
    runs.into_iter()
        .enumerate()
        .map(|(i, (name, raw))| Sample::new(i, name, raw.into_traces(admission)))
        .collect()
}

#[test]
fn test_synthetic_triangle_peak() {
    let trace = MassTrace::try_new(
        0,
        300.0,
        (0..9).map(|i| i as f64).collect(),
        vec![0.0, 0.0, 100.0, 500.0, 1000.0, 500.0, 100.0, 0.0, 0.0],
    )
    .unwrap();
    let config = ProcessingConfig {
        min_intensity: 50.0,
        min_peak_width: 1.0,
        min_prominence: 100.0,
        snr: 2.0,
        ..Default::default()
    };
    let detector = TracePeakDetector::new((&config).into());
    let peaks = detector.detect(&trace, 0, 0);
    assert_eq!(peaks.len(), 1);
    assert_eq!(peaks[0].apex_index, 4);
    assert!(peaks[0].goodness_of_fit() > 0.95);
}

#[test]
fn test_aligner_corrects_ten_ppm_drift() {
    let reference = vec![500.0, 501.003_355, 502.0, 503.003_355];
    let anchors = vec![(0, 1), (2, 3)];
    let sample: Vec<f64> = reference.iter().map(|m| m * 1.00001).collect();
    let aligner = AnchorGuidedAligner::from(&ProcessingConfig::default());
    let out = aligner.align(&reference, &anchors, &sample, &anchors);
    assert!(out.drift_corrected);
    assert!((out.correction_ratio - 1e-5).abs() < 1e-8);
    for (k, s) in out.positions.iter().enumerate() {
        let corrected = sample[s.unwrap()] / (1.0 + out.correction_ratio);
        assert!((corrected - reference[k]).abs() / reference[k] * 1e6 <= 5.0);
    }
}

#[test]
fn test_aligner_appends_unmatched_values() {
    let aligner = AnchorGuidedAligner::from(&ProcessingConfig::default());
    let out = aligner.align(&[100.0, 200.0], &[], &[100.0003, 300.0], &[]);
    assert_eq!(out.reference_mz, vec![100.0, 200.0, 300.0]);
    assert_eq!(out.positions, vec![Some(0), None, Some(1)]);
}

#[test]
fn test_full_experiment() {
    let config = config();
    let db = reference_list();
    let experiment = Experiment::new(config.clone(), Some(&db)).unwrap();
    let result = experiment.run(samples(&config)).unwrap();

    let status: Vec<&SampleStatus> = result.samples.iter().map(|s| &s.status).collect();
    assert_eq!(status[0], &SampleStatus::Valid);
    assert_eq!(status[1], &SampleStatus::Valid);
    assert_eq!(status[2], &SampleStatus::Valid);
    assert_eq!(
        status[3],
        &SampleStatus::Invalid(InvalidReason::TooFewRtAnchors {
            found: 3,
            required: 50
        })
    );
    assert_eq!(result.valid_sample_names(), vec!["A", "B", "C"]);

    // The 7 ppm shift of C was corrected, the 3 ppm one of B only measured.
    let b = &result.samples[1];
    let c = &result.samples[2];
    assert!(b.traces.iter().all(|t| t.calibrated_mz().is_none()));
    assert!(c.traces.iter().all(|t| t.calibrated_mz().is_some()));
    assert!((c.mass_shift_ppm.unwrap() - 7.0).abs() < 0.5);

    // Every compound plus every satellite, each seen in the three valid runs.
    assert_eq!(result.features.len(), IDENTITIES + IDENTITIES / 5);
    for f in result.features.iter() {
        assert_eq!(f.per_sample_intensity.len(), 3, "{:?}", f);
        assert!(!f.per_sample_intensity.contains_key("D"));
        assert!(f.mz < 990.0);
        assert_eq!(f.presence, 1.0);
    }
    let glucose_like = result
        .features
        .iter()
        .find(|f| f.mass_id == "ID10")
        .unwrap();
    assert!((glucose_like.rtime - identity_rt(10)).abs() < 10.0);
    assert!(glucose_like.peak_quality_max > 0.9);

    let satellites = result
        .features
        .iter()
        .filter(|f| f.mass_id.starts_with("_M_"))
        .count();
    assert_eq!(satellites, IDENTITIES / 5);

    let ids: Vec<&str> = result.features.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids[0], "F1");
    assert!(result.features.windows(2).all(|w| w[0].mz <= w[1].mz));
}

#[test]
fn test_experiment_is_deterministic() {
    let config = config();
    let db = reference_list();
    let experiment = Experiment::new(config.clone(), Some(&db)).unwrap();
    let first = experiment.run(samples(&config)).unwrap();
    let second = experiment.run(samples(&config)).unwrap();
    assert_eq!(first.features, second.features);
    assert_eq!(first.grid.mz_list(), second.grid.mz_list());
}

#[test]
fn test_without_reference_masses_everything_is_unidentified() {
    let config = ProcessingConfig::default();
    let experiment = Experiment::new(config.clone(), None).unwrap();
    let result = experiment.run(samples(&config)[..2].to_vec()).unwrap();
    assert!(result.samples.iter().all(|s| s.is_valid()));
    assert!(result.samples.iter().all(|s| s.rt_calibration.is_none()));
    assert!(result.features.iter().all(|f| f.mass_id.starts_with("_M_")));
    assert_eq!(result.mass_stdev_ppm, config.mz_tolerance_ppm);
    // A and B share every compound, 3 ppm apart.
    assert_eq!(result.features.len(), IDENTITIES + IDENTITIES / 5);
    assert!(result.features.iter().all(|f| f.per_sample_intensity.len() == 2));
}

#[test]
fn test_without_rt_alignment_samples_stay_uncalibrated() {
    let config = ProcessingConfig {
        rt_align_on: false,
        ..config()
    };
    let db = reference_list();
    let experiment = Experiment::new(config.clone(), Some(&db)).unwrap();
    let result = experiment.run(samples(&config)).unwrap();
    // The sparse run passes mass calibration and nothing else can exclude it.
    assert!(result.samples.iter().all(|s| s.is_valid()));
    assert!(result.samples.iter().all(|s| s.rt_calibration.is_none()));
    assert_eq!(result.valid_sample_names(), vec!["A", "B", "C", "D"]);
}
