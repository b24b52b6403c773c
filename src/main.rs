//! epgfilter — filters XMLTV EPG guides down to a channel list and the
//! current 06:00-to-06:00 broadcast day, then writes the result as XMLTV or
//! JSON. One run, one output file.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod fetch;
mod filter;
mod merge;
mod output;
mod pipeline;
mod window;
mod xmltv;

use config::AppConfig;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "epgfilter", version, about)]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, default_value = "epgfilter.json")]
    config: PathBuf,
    /// Override the configured output path.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Override the configured output format.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    if let Some(path) = args.output {
        config.output = path;
    }
    if let Some(format) = args.format {
        config.format = format;
    }

    match pipeline::run(&config) {
        Ok(report) => {
            for outcome in &report.outcomes {
                match outcome.error {
                    Some(ref e) => warn!("source {} contributed nothing: {}", outcome.name, e),
                    None => info!("source {}: {} programmes", outcome.name, outcome.retained),
                }
            }
            info!("{} programmes retained", report.retained);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
