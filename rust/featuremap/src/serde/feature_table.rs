use crate::errors::DataReadingError;
use crate::models::{
    Feature,
    SampleSummary,
};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const FULL_TABLE_NAME: &str = "full_feature_table.tsv";
pub const PREFERRED_TABLE_NAME: &str = "preferred_feature_table.tsv";
pub const SAMPLES_SUMMARY_NAME: &str = "samples.json";

const FIXED_COLUMNS: [&str; 12] = [
    "id",
    "mass_id",
    "mz",
    "rtime",
    "rt_min",
    "rt_max",
    "number_peaks",
    "peak_quality_max",
    "peak_quality_median",
    "intensity_mean",
    "selectivity_mz",
    "presence",
];

/// Writes `features` as a tab separated table with one intensity column per sample.
///
/// Samples a feature has no peak in get an intensity of 0.
pub fn write_features<'a, W: Write>(
    writer: W,
    features: impl IntoIterator<Item = &'a Feature>,
    sample_names: &[String],
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    wtr.write_record(
        FIXED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(sample_names.iter().cloned()),
    )?;
    for f in features {
        let mut record = vec![
            f.id.clone(),
            f.mass_id.clone(),
            format!("{:.6}", f.mz),
            format!("{:.2}", f.rtime),
            format!("{:.2}", f.rt_min),
            format!("{:.2}", f.rt_max),
            f.number_peaks.to_string(),
            format!("{:.3}", f.peak_quality_max),
            format!("{:.3}", f.peak_quality_median),
            format!("{:.1}", f.intensity_mean),
            format!("{:.3}", f.selectivity_mz),
            format!("{:.3}", f.presence),
        ];
        record.extend(sample_names.iter().map(|name| {
            let value = f.per_sample_intensity.get(name).copied().unwrap_or(0.0);
            format!("{:.1}", value)
        }));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_feature_table<'a>(
    path: &Path,
    features: impl IntoIterator<Item = &'a Feature>,
    sample_names: &[String],
) -> Result<(), DataReadingError> {
    let file = std::fs::File::create(path).map_err(|e| DataReadingError::FileReadingError {
        source: e,
        path: path.to_path_buf(),
    })?;
    write_features(std::io::BufWriter::new(file), features, sample_names).map_err(|e| {
        DataReadingError::CsvError {
            source: e,
            path: path.to_path_buf(),
        }
    })?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn write_sample_summaries(path: &Path, summaries: &[SampleSummary]) -> Result<(), DataReadingError> {
    let file = std::fs::File::create(path).map_err(|e| DataReadingError::FileReadingError {
        source: e,
        path: path.to_path_buf(),
    })?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), summaries).map_err(|e| {
        DataReadingError::JsonParsingError {
            source: e,
            path: path.to_path_buf(),
        }
    })?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_table_layout() {
        let feature = Feature {
            id: "F1".into(),
            mass_id: "C6H12O6_180.0634".into(),
            mz: 181.070_7,
            rtime: 101.0,
            rt_min: 97.0,
            rt_max: 105.0,
            number_peaks: 2,
            peak_quality_max: 0.97,
            peak_quality_median: 0.95,
            intensity_mean: 1500.0,
            selectivity_mz: 1.0,
            presence: 0.5,
            per_sample_intensity: BTreeMap::from([("b".to_string(), 1000.0), ("a".to_string(), 2000.0)]),
        };
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut buf = Vec::new();
        write_features(&mut buf, [&feature], &names).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let header: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(header.len(), 15);
        assert_eq!(&header[..3], &["id", "mass_id", "mz"]);
        assert_eq!(&header[12..], &["a", "b", "c"]);
        let row: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(row[0], "F1");
        assert_eq!(row[2], "181.070700");
        assert_eq!(&row[12..], &["2000.0", "1000.0", "0.0"]);
    }
}
