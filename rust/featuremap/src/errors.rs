use std::path::PathBuf;

#[derive(Debug)]
pub enum DataProcessingError {
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    ExpectedFiniteNonNanData {
        context: String,
    },
    ExpectedStrictlyIncreasing {
        context: String,
    },
}

impl std::fmt::Display for DataProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataProcessingError::ExpectedSlicesSameLength {
                expected,
                other,
                context,
            } => write!(
                f,
                "Expected slices of the same length ({} != {}): {}",
                expected, other, context
            ),
            DataProcessingError::ExpectedFiniteNonNanData { context } => {
                write!(f, "Expected finite, non-NaN data: {}", context)
            }
            DataProcessingError::ExpectedStrictlyIncreasing { context } => {
                write!(f, "Expected strictly increasing values: {}", context)
            }
        }
    }
}

#[derive(Debug)]
pub enum DataReadingError {
    FileReadingError {
        source: std::io::Error,
        path: PathBuf,
    },
    JsonParsingError {
        source: serde_json::Error,
        path: PathBuf,
    },
    CsvError {
        source: csv::Error,
        path: PathBuf,
    },
}

impl std::fmt::Display for DataReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataReadingError::FileReadingError { source, path } => {
                write!(f, "Error reading {}: {}", path.display(), source)
            }
            DataReadingError::JsonParsingError { source, path } => {
                write!(f, "Error parsing JSON in {}: {}", path.display(), source)
            }
            DataReadingError::CsvError { source, path } => {
                write!(f, "Error handling table {}: {}", path.display(), source)
            }
        }
    }
}

#[derive(Debug)]
pub enum FeatureMapError {
    DataProcessing(DataProcessingError),
    DataReading(DataReadingError),
    Config { msg: String },
}

impl std::fmt::Display for FeatureMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureMapError::DataProcessing(e) => write!(f, "{}", e),
            FeatureMapError::DataReading(e) => write!(f, "{}", e),
            FeatureMapError::Config { msg } => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for FeatureMapError {}

pub type Result<T> = std::result::Result<T, FeatureMapError>;

impl From<DataProcessingError> for FeatureMapError {
    fn from(x: DataProcessingError) -> Self {
        Self::DataProcessing(x)
    }
}

impl From<DataReadingError> for FeatureMapError {
    fn from(x: DataReadingError) -> Self {
        Self::DataReading(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MassTrace;

    #[test]
    fn test_trace_errors_keep_their_context() {
        let err: FeatureMapError = MassTrace::try_new(7, 100.0, vec![0.0, 1.0], vec![1.0])
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            FeatureMapError::DataProcessing(DataProcessingError::ExpectedSlicesSameLength {
                expected: 2,
                other: 1,
                ..
            })
        ));
        assert!(err.to_string().contains("trace 7"));
    }
}
