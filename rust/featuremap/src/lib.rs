#![doc = include_str!("../README.md")]

// Re-export main structures
pub use crate::alignment::{
    AnchorGuidedAligner,
    ReferenceGrid,
};
pub use crate::config::ProcessingConfig;
pub use crate::correspondence::CorrespondenceBuilder;
pub use crate::detection::TracePeakDetector;
pub use crate::experiment::{
    Experiment,
    ExperimentResult,
};
pub use crate::mass_calibration::SampleMassCalibrator;
pub use crate::models::{
    Feature,
    MassTrace,
    Peak,
    Sample,
    SampleStatus,
    SampleSummary,
};
pub use crate::peak_model::{
    FitOutcome,
    GaussianParams,
    PeakModel,
};
pub use crate::reference_masses::{
    FormulaMassDatabase,
    ReferenceMass,
    ReferenceMassList,
};
pub use crate::rt_calibration::RTCalibrator;

// Declare modules
pub mod alignment;
pub mod anchors;
pub mod config;
pub mod correspondence;
pub mod detection;
pub mod errors;
pub mod experiment;
pub mod mass_calibration;
pub mod matching;
pub mod models;
pub mod peak_model;
pub mod reference_masses;
pub mod rt_calibration;
pub mod selectivity;
pub mod serde;
pub mod utils;

// Re-export errors
pub use crate::errors::{
    DataProcessingError,
    DataReadingError,
    FeatureMapError,
};
