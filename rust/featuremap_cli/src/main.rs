mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let args = Cli::parse();

    let conf = match std::fs::File::open(&args.config) {
        Ok(x) => x,
        Err(e) => {
            return Err(errors::CliError::Io {
                source: e.to_string(),
                path: Some(args.config.to_string_lossy().to_string()),
            });
        }
    };
    let config = Config::from_reader(std::io::BufReader::new(conf))?.with_cli_args(args)?;
    info!("Parsed configuration: {:#?}", config);

    let (Some(input), Some(output)) = (config.input.as_ref(), config.output.as_ref()) else {
        return Err(errors::CliError::Config {
            source: "Both an input and an output are required".to_string(),
        });
    };

    if let Err(e) = std::fs::create_dir_all(&output.directory) {
        return Err(errors::CliError::Io {
            source: e.to_string(),
            path: Some(output.directory.to_string_lossy().to_string()),
        });
    }

    processing::process_samples(input, &config.analysis, output)
}
