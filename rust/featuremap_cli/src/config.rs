use featuremap::ProcessingConfig;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub analysis: ProcessingConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct InputConfig {
    /// One chromatogram file per sample, in sample order.
    pub files: Vec<PathBuf>,
    pub reference_masses: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, CliError> {
        serde_json::from_reader(reader).map_err(|e| CliError::ParseError { msg: e.to_string() })
    }

    /// Command line values take precedence over the ones in the file.
    pub fn with_cli_args(mut self, args: Cli) -> Result<Self, CliError> {
        if let Some(files) = args.input {
            self.input.get_or_insert_with(InputConfig::default).files = files;
        }
        if let Some(path) = args.reference_masses {
            self.input.get_or_insert_with(InputConfig::default).reference_masses = Some(path);
        }
        if let Some(directory) = args.output_dir {
            self.output = Some(OutputConfig { directory });
        }

        match self.input.as_ref() {
            Some(input) if !input.files.is_empty() => {}
            _ => {
                return Err(CliError::Config {
                    source: "No input provided, please provide one in either the config file or with the --input flag".to_string(),
                });
            }
        }
        if self.output.is_none() {
            return Err(CliError::Config {
                source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
            });
        }
        self.analysis.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_file() {
        let config = Config::from_reader(
            r#"{
                "input": {"files": ["a.json"], "reference_masses": null},
                "analysis": {"snr": 3.0},
                "output": {"directory": "from_file"}
            }"#
            .as_bytes(),
        )
        .unwrap();
        let args = Cli::parse_from(["featuremap", "-c", "conf.json", "-i", "x.json", "y.json", "-o", "out"]);
        let config = config.with_cli_args(args).unwrap();
        let input = config.input.unwrap();
        assert_eq!(input.files, vec![PathBuf::from("x.json"), PathBuf::from("y.json")]);
        assert_eq!(config.output.unwrap().directory, PathBuf::from("out"));
        assert_eq!(config.analysis.snr, 3.0);
        assert_eq!(config.analysis.std_ppm, 5.0);
    }

    #[test]
    fn test_missing_input_is_rejected() {
        let config = Config::from_reader(r#"{"output": {"directory": "out"}}"#.as_bytes()).unwrap();
        let args = Cli::parse_from(["featuremap", "-c", "conf.json"]);
        assert!(matches!(config.with_cli_args(args), Err(CliError::Config { .. })));
    }
}
