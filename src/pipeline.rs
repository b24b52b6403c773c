//! The run-once pipeline: fetch, decompress, parse, filter, merge, write
//!
//! Each source runs its whole chain on its own worker thread and yields a
//! complete, immutable programme sequence; the merge after the joins is the
//! only synchronization point. A failing source degrades to zero records and
//! never takes the others down with it.

use chrono::Utc;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::thread;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, SourceConfig};
use crate::fetch::{self, FetchConfig};
use crate::filter;
use crate::merge;
use crate::output;
use crate::window::{self, BroadcastWindow};
use crate::xmltv::{self, Channel, Programme};

/// How one source fared, for end-of-run reporting.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub name: String,
    pub retained: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    /// Programme count in the written output.
    pub retained: usize,
    pub outcomes: Vec<SourceOutcome>,
}

/// Run the whole pipeline once. Returns `Err` only for run-fatal conditions:
/// bad timezone, every source failing, or the output write failing.
pub fn run(config: &AppConfig) -> Result<RunReport, String> {
    let tz: Tz = config
        .timezone
        .parse()
        .map_err(|_| format!("Unknown timezone: {}", config.timezone))?;

    let window = window::broadcast_window(Utc::now(), tz);
    info!(
        "broadcast window [{} .. {}) in {}",
        window.start, window.end, config.timezone
    );

    let channels: HashSet<String> = config.channels.iter().cloned().collect();
    if channels.is_empty() {
        warn!("channel allow-list is empty; no programme can match");
    }

    let mut handles = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let name = source.label().to_string();
        let source = source.clone();
        let fetch_config = config.fetch.clone();
        let channels = channels.clone();
        let handle =
            thread::spawn(move || process_source(&source, &fetch_config, &window, &channels));
        handles.push((name, handle));
    }

    let mut per_source = Vec::new();
    let mut per_source_channels = Vec::new();
    let mut outcomes = Vec::new();
    for (name, handle) in handles {
        let result = handle
            .join()
            .unwrap_or_else(|_| Err("worker thread panicked".to_string()));
        match result {
            Ok((channels, programmes)) => {
                info!("{}: {} programmes retained", name, programmes.len());
                outcomes.push(SourceOutcome {
                    name,
                    retained: programmes.len(),
                    error: None,
                });
                per_source_channels.push(channels);
                per_source.push(programmes);
            }
            Err(e) => {
                warn!("{}: {}", name, e);
                outcomes.push(SourceOutcome {
                    name,
                    retained: 0,
                    error: Some(e),
                });
            }
        }
    }

    // All sources failing is distinct from sources succeeding with nothing in
    // the window: the former writes no file at all.
    if per_source.is_empty() {
        return Err("no source yielded data; nothing written".to_string());
    }

    let merged = merge::merge(per_source, config.merge);
    let merged_channels = merge::merge_channels(per_source_channels);
    let projected = output::project(merged);
    output::write_output(&config.output, config.format, &merged_channels, &projected)?;
    info!(
        "wrote {} programmes to {}",
        projected.len(),
        config.output.display()
    );

    Ok(RunReport {
        retained: projected.len(),
        outcomes,
    })
}

fn process_source(
    source: &SourceConfig,
    fetch_config: &FetchConfig,
    window: &BroadcastWindow,
    channels: &HashSet<String>,
) -> Result<(Vec<Channel>, Vec<Programme>), String> {
    let body = fetch::fetch(&source.url, fetch_config)?;
    let body = fetch::decompress(source.label(), body, source.gzip)?;

    let guide = xmltv::parse_reader(body.as_slice())?;
    if guide.error_count > 0 {
        debug!(
            "{}: skipped {} malformed XML events",
            source.label(),
            guide.error_count
        );
    }

    let parsed = guide.programmes.len();
    let kept = filter::filter_programmes(guide.programmes, window, channels);
    let kept_channels = filter::filter_channels(guide.channels, channels);
    debug!(
        "{}: {} of {} programmes in window and allow-list",
        source.label(),
        kept.len(),
        parsed
    );
    Ok((kept_channels, kept))
}
