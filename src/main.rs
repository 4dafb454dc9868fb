mod chart;
mod cli;
mod collector;
mod command;
mod config;
mod diff;
mod format;
mod page;
mod series;
mod site;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Build version: CI sets WEIGHT_TRACKER_VERSION from the git tag, local builds use Cargo.toml.
pub const VERSION: &str = match option_env!("WEIGHT_TRACKER_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// weight-tracker: collect and chart the size of Rust/wasm build artifacts.
///
/// `measure` builds benchmark projects and records their inputs and output
/// sizes, `merge` and `site` assemble those records into a dated feed, and
/// `render` turns the feed into a page of charts.
#[derive(Parser)]
#[command(name = "weight-tracker", version = VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build benchmarks and record their inputs and artifact sizes
    Measure {
        /// Where to write the measurements (JSON)
        output: PathBuf,

        /// Benchmarks to build (see `weight-tracker benchmarks`)
        #[arg(required = true)]
        benchmarks: Vec<String>,

        /// Temporary build directory (default: configured work dir)
        #[arg(long)]
        tmp_dir: Option<PathBuf>,
    },

    /// Concatenate several measurement files into one
    Merge {
        /// Where to write the merged measurements
        output: PathBuf,

        /// Measurement files, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Assemble the feed from a directory of dated builds
    #[command(group(ArgGroup::new("data").required(true).args(["git", "local"])))]
    Site {
        /// Where to write the feed (data.json)
        output: PathBuf,

        /// Clone the data repository into DIR (reused if it exists)
        #[arg(long, value_name = "DIR")]
        git: Option<PathBuf>,

        /// Use data already in DIR
        #[arg(long, value_name = "DIR")]
        local: Option<PathBuf>,

        /// Keep only the N most recent builds
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Show what changed between consecutive builds in a feed
    Diff {
        /// Feed file (data.json)
        feed: PathBuf,

        /// Only this benchmark
        #[arg(long)]
        benchmark: Option<String>,
    },

    /// Render a feed as an HTML page of charts
    Render {
        /// Feed file (data.json)
        feed: PathBuf,

        /// Where to write the page
        output: PathBuf,

        /// Start in relative (percentage) mode instead of absolute bytes
        #[arg(long)]
        relative: bool,
    },

    /// List the benchmarks `measure` knows how to build
    Benchmarks,
}

fn main() -> Result<()> {
    // WEIGHT_TRACKER_LOG, not RUST_LOG. Default: only warnings.
    // Set WEIGHT_TRACKER_LOG=weight_tracker=debug for verbose output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_env("WEIGHT_TRACKER_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("weight_tracker=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Benchmarks) {
        return cli::benchmarks();
    }

    let config = config::Config::load()?;

    match cli.command {
        Commands::Measure {
            output,
            benchmarks,
            tmp_dir,
        } => cli::measure(&config, &output, &benchmarks, tmp_dir.as_deref()),
        Commands::Merge { output, inputs } => cli::merge(&output, &inputs),
        Commands::Site {
            output,
            git,
            local,
            limit,
        } => cli::site(&config, &output, git.as_deref(), local.as_deref(), limit),
        Commands::Diff { feed, benchmark } => cli::diff(&feed, benchmark.as_deref()),
        Commands::Render {
            feed,
            output,
            relative,
        } => cli::render(&config, &feed, &output, relative),
        Commands::Benchmarks => cli::benchmarks(),
    }
}
