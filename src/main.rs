// diffmux - groups a unified diff into semantically coherent commits with
// AI-generated messages (spec §1).

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use diffmux::config::load_config;
use diffmux::{Pipeline, PipelineOptions};

/// Group a unified diff into semantically coherent commits.
#[derive(Debug, Parser)]
#[command(name = "diffmux", version, about)]
struct Cli {
    /// Clustering distance threshold, in `1 - cosine_similarity` space.
    #[arg(short = 'd', long = "distance-threshold", default_value_t = 0.5)]
    distance_threshold: f32,

    /// Increase log verbosity (-v, -vv).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit visualization.json alongside commits.json.
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Output directory. Defaults to a process-specific temp directory.
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Chunker's size bound, in bytes.
    #[arg(long = "max-chars", default_value_t = diffmux::chunk::DEFAULT_MAX_CHARS)]
    max_chars: usize,
}

fn level_for(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(level_for(cli.verbose))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let mut diff_text = String::new();
    io::stdin()
        .read_to_string(&mut diff_text)
        .context("failed to read diff from stdin")?;

    let opts = PipelineOptions {
        out_dir: cli
            .out
            .unwrap_or_else(|| std::env::temp_dir().join(format!("diffmux-{}", std::process::id()))),
        max_chars: cli.max_chars,
        threshold: cli.distance_threshold,
        interactive: cli.interactive,
    };

    let mut pipeline = Pipeline::new(&config).context("failed to initialize pipeline")?;
    let groups = pipeline
        .run(diff_text.lines(), &opts)
        .map_err(|e| anyhow::anyhow!(e))
        .context("pipeline run failed")?;

    println!("wrote {} commit group(s) to {}", groups.len(), opts.out_dir.display());
    Ok(())
}
