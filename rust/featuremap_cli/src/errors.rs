#[derive(Debug)]
pub enum CliError {
    Config {
        source: String,
    },
    ParseError {
        msg: String,
    },
    Io {
        source: String,
        path: Option<String>,
    },
    DataReading {
        source: String,
    },
    Processing {
        source: String,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config { source } => write!(f, "Error interpreting the config: {}", source),
            CliError::ParseError { msg } => write!(f, "Error parsing config: {}", msg),
            CliError::Io { source, path } => {
                if let Some(path) = path {
                    write!(f, "Error reading file {}: {}", path, source)
                } else {
                    write!(f, "Error reading file: {}", source)
                }
            }
            CliError::DataReading { source } => write!(f, "Error reading data: {}", source),
            CliError::Processing { source } => write!(f, "Error processing samples: {}", source),
        }
    }
}

impl std::error::Error for CliError {}

impl From<featuremap::DataReadingError> for CliError {
    fn from(e: featuremap::DataReadingError) -> Self {
        CliError::DataReading {
            source: e.to_string(),
        }
    }
}

impl From<featuremap::FeatureMapError> for CliError {
    fn from(e: featuremap::FeatureMapError) -> Self {
        match e {
            featuremap::FeatureMapError::DataReading(e) => e.into(),
            featuremap::FeatureMapError::Config { msg } => CliError::Config { source: msg },
            other => CliError::Processing {
                source: other.to_string(),
            },
        }
    }
}
