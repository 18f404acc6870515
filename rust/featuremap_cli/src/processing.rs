use crate::config::{
    InputConfig,
    OutputConfig,
};
use crate::errors::CliError;
use featuremap::models::split_by_quality;
use featuremap::serde::{
    FULL_TABLE_NAME,
    JsonChromatogramReader,
    PREFERRED_TABLE_NAME,
    SAMPLES_SUMMARY_NAME,
    TraceAdmission,
    load_sample,
    read_reference_masses,
    write_feature_table,
    write_sample_summaries,
};
use featuremap::{
    Experiment,
    FormulaMassDatabase,
    ProcessingConfig,
    Sample,
};
use indicatif::{
    ParallelProgressIterator,
    ProgressStyle,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

fn load_samples(files: &[PathBuf], admission: TraceAdmission) -> Result<Vec<Sample>, CliError> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_err(|e| CliError::Config {
        source: e.to_string(),
    })?;
    let reader = JsonChromatogramReader;
    let samples = files
        .par_iter()
        .enumerate()
        .progress_with_style(style)
        .map(|(id, path)| load_sample(&reader, path, id, admission))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    for s in samples.iter() {
        if !seen.insert(s.name.as_str()) {
            return Err(CliError::Config {
                source: format!("Two input files are named {}, sample names must be unique", s.name),
            });
        }
    }
    Ok(samples)
}

pub fn process_samples(
    input: &InputConfig,
    analysis: &ProcessingConfig,
    output: &OutputConfig,
) -> Result<(), CliError> {
    let start = Instant::now();
    let db = match input.reference_masses.as_ref() {
        Some(path) => {
            let db = read_reference_masses(path)?;
            info!("Loaded {} reference masses from {}", db.len(), path.display());
            Some(db)
        }
        None => {
            info!("No reference masses given, every feature stays unidentified");
            None
        }
    };

    info!("Loading {} samples", input.files.len());
    let samples = load_samples(&input.files, TraceAdmission::from(analysis))?;
    info!("Loaded samples in {:?}", start.elapsed());

    let experiment = Experiment::new(
        analysis.clone(),
        db.as_ref().map(|d| d as &dyn FormulaMassDatabase),
    )?;
    let result = experiment.run(samples)?;

    let names = result.valid_sample_names();
    let (preferred, _) = split_by_quality(
        &result.features,
        analysis.high_quality_min_peak_quality,
        analysis.high_quality_min_presence,
    );
    write_feature_table(
        &output.directory.join(FULL_TABLE_NAME),
        result.features.iter(),
        &names,
    )?;
    write_feature_table(
        &output.directory.join(PREFERRED_TABLE_NAME),
        preferred.iter().copied(),
        &names,
    )?;
    write_sample_summaries(
        &output.directory.join(SAMPLES_SUMMARY_NAME),
        &result.summaries(),
    )?;

    println!(
        "Found {} features ({} preferred) over {} valid samples",
        result.features.len(),
        preferred.len(),
        names.len()
    );
    println!("Finished processing in {:?}", start.elapsed());
    Ok(())
}
