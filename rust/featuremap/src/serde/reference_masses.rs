use crate::errors::DataReadingError;
use crate::reference_masses::{
    ReferenceMass,
    ReferenceMassList,
};
use std::path::Path;
use tracing::info;

/// Reads a tab separated table with `identity` and `mz` columns.
pub fn read_reference_masses<T: AsRef<Path>>(path: T) -> Result<ReferenceMassList, DataReadingError> {
    let path = path.as_ref();
    let csv_error = |source: csv::Error| DataReadingError::CsvError {
        source,
        path: path.to_path_buf(),
    };
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(csv_error)?;

    let mut entries = Vec::new();
    for row in rdr.deserialize() {
        let entry: ReferenceMass = row.map_err(csv_error)?;
        entries.push(entry);
    }
    info!("Read {} reference masses from {}", entries.len(), path.display());
    Ok(ReferenceMassList::new(entries))
}
