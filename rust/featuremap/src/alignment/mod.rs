pub mod aligner;
pub mod grid;
pub mod service;

pub use aligner::{
    AlignmentOutcome,
    AnchorGuidedAligner,
};
pub use grid::ReferenceGrid;
pub use service::{
    Collator,
    process_and_align,
};
