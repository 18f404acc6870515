pub mod feature;
pub mod mass_trace;
pub mod peak;
pub mod sample;

pub use feature::{
    Feature,
    split_by_quality,
};
pub use mass_trace::MassTrace;
pub use peak::{
    CalibratedTimes,
    Peak,
};
pub use sample::{
    InvalidReason,
    Sample,
    SampleStatus,
    SampleSummary,
};
