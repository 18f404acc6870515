use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Chromatogram files, one per sample (will over-write the config file)
    #[arg(short, long, num_args = 1..)]
    pub input: Option<Vec<PathBuf>>,

    /// Tab separated list of known masses, with `identity` and `mz` columns
    #[arg(short, long)]
    pub reference_masses: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}
