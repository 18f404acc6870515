pub mod chromatograms;
pub mod feature_table;
mod reference_masses;

pub use chromatograms::{
    ChromatogramReader,
    JsonChromatogramReader,
    RawChromatograms,
    RawTrace,
    TraceAdmission,
    load_sample,
};
pub use feature_table::{
    FULL_TABLE_NAME,
    PREFERRED_TABLE_NAME,
    SAMPLES_SUMMARY_NAME,
    write_feature_table,
    write_features,
    write_sample_summaries,
};
pub use reference_masses::read_reference_masses;
