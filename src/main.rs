mod aggregation;
mod config;
mod error;
mod export;
mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::aggregation::read_edges;
use crate::config::{ConvertConfig, Layout, DEFAULT_INPUT};
use crate::export::write_jsonobj;

#[derive(Parser, Debug)]
#[command(name = "edgegraph", version)]
#[command(about = "Convert a survival-analysis edge table into a `var jsonobj` script")]
struct Cli {
    /// Edge table CSV; the first line is a header
    #[arg(default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Column layout of the input file
    #[arg(long, value_enum, default_value_t = Layout::Hazard)]
    layout: Layout,

    /// JSON file describing columns, formatting and output location (takes precedence over --layout)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file (defaults to all.edges.csv.js, placed according to the layout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log at debug level unless EDGEGRAPH_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> Result<PathBuf> {
    let config = match &cli.config {
        Some(path) => ConvertConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => cli.layout.config(),
    };

    let output = match &cli.output {
        Some(path) => path.clone(),
        None => config.output_path(&cli.input)?,
    };

    info!(input = %cli.input.display(), output = %output.display(), "converting");

    let graph = read_edges(&cli.input, &config)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    write_jsonobj(&graph, &output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    Ok(output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_default(if cli.verbose { "debug" } else { "info" });

    run(&cli)?;

    Ok(())
}
