use clap::{Args, Parser, Subcommand};
use molnet::engine::config::ScoringMethod;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Molnet Developers",
    version,
    about = "Molnet CLI - Build molecular networks and molecular families from MS2 spectra.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster spectra, build the similarity network and split it into molecular families.
    Network(NetworkArgs),
    /// Search query spectra against a spectral library.
    Match(MatchArgs),
}

/// Arguments for the `network` subcommand.
#[derive(Args, Debug)]
pub struct NetworkArgs {
    // --- Core Arguments ---
    /// One or more MGF files with the spectra to network.
    #[arg(short, long = "input", required = true, num_args = 1.., value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Output prefix; `<PREFIX>_nodes.csv`, `<PREFIX>_edges.csv`, `<PREFIX>.mgf` and
    /// `<PREFIX>_parameters.csv` are written.
    #[arg(short, long, required = true, value_name = "PREFIX")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Spectral library (MGF) used to annotate clusters.
    #[arg(short, long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    // --- Scoring Overrides ---
    /// Fragment m/z tolerance used when matching peaks.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Minimum number of matched peaks for a non-zero score.
    #[arg(long, value_name = "NUM")]
    pub min_match: Option<usize>,

    /// Similarity function ('cosine' or 'shifted-cosine').
    #[arg(short, long, value_name = "METHOD")]
    pub method: Option<ScoringMethod>,

    // --- Network Overrides ---
    /// Minimum similarity for an edge between two clusters.
    #[arg(short = 's', long, value_name = "FLOAT")]
    pub score_threshold: Option<f64>,

    /// Keep an edge only if each endpoint ranks among the other's K strongest neighbours.
    #[arg(short = 'k', long, value_name = "K")]
    pub top_k: Option<usize>,

    /// Largest parent mass difference for which two clusters are scored.
    #[arg(long, value_name = "FLOAT")]
    pub max_mass_shift: Option<f64>,

    /// Largest number of clusters in one molecular family.
    #[arg(short = 'b', long, value_name = "NUM")]
    pub max_family_size: Option<usize>,

    /// Clusters with fewer spectra are left out of the network.
    #[arg(long, value_name = "NUM")]
    pub min_cluster_size: Option<usize>,

    /// Drop every cluster containing a spectrum from this source (repeatable).
    #[arg(short = 'x', long = "exclude-source", value_name = "NAME")]
    pub exclude_sources: Vec<String>,

    #[command(flatten)]
    pub clustering: ClusteringToggle,

    // --- Generic Overrides ---
    /// Set a configuration value using a KEY=VALUE pair.
    /// This overrides values from the config file, but not explicit flags above.
    /// Example: -S clustering.rt-tolerance=30
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct ClusteringToggle {
    /// Merge near-identical spectra into clusters before networking.
    #[arg(long)]
    pub cluster: bool,

    /// Network every spectrum on its own.
    #[arg(long)]
    pub no_cluster: bool,
}

impl ClusteringToggle {
    pub fn as_option(&self) -> Option<bool> {
        if self.cluster {
            Some(true)
        } else if self.no_cluster {
            Some(false)
        } else {
            None
        }
    }
}

/// Arguments for the `match` subcommand.
#[derive(Args, Debug)]
pub struct MatchArgs {
    /// One or more MGF files with query spectra.
    #[arg(short, long = "input", required = true, num_args = 1.., value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Spectral library in MGF format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub library: PathBuf,

    /// Path for the hit table (CSV).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Similarity function ('cosine' or 'shifted-cosine').
    #[arg(short, long, value_name = "METHOD")]
    pub method: Option<ScoringMethod>,

    /// Largest precursor m/z difference (exclusive) for a library entry to be scored.
    #[arg(long, value_name = "FLOAT")]
    pub precursor_tolerance: Option<f64>,

    /// Fragment m/z tolerance used when matching peaks.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Minimum number of matched peaks for a non-zero score.
    #[arg(long, value_name = "NUM")]
    pub min_match: Option<usize>,

    /// Minimum score for a hit to be reported.
    #[arg(short = 's', long, value_name = "FLOAT")]
    pub score_threshold: Option<f64>,

    /// Report at most this many hits per query.
    #[arg(short = 'n', long, value_name = "NUM")]
    pub max_hits: Option<usize>,
}
