//! Programme filter: broadcast-window overlap plus channel allow-list
//!
//! A programme is retained iff it overlaps the half-open window and its
//! channel identifier is listed verbatim. Channel identifier spaces differ
//! per mirror (display names, numeric codes, slugs), so matching is exact:
//! no case folding, no trimming.

use std::collections::HashSet;

use crate::window::BroadcastWindow;
use crate::xmltv::{Channel, Programme};

/// Whether a single programme survives the filter.
///
/// Missing or malformed start/stop and empty channel identifiers are quietly
/// excluded; a malformed record never aborts the batch.
pub fn retain(programme: &Programme, window: &BroadcastWindow, channels: &HashSet<String>) -> bool {
    let start = match programme.start {
        Some(t) => t,
        None => return false,
    };
    let stop = match programme.stop {
        Some(t) => t,
        None => return false,
    };
    if programme.channel.is_empty() || !channels.contains(&programme.channel) {
        return false;
    }

    // Half-open overlap: a programme ending exactly at window start, or
    // starting exactly at window end, is out.
    stop > window.start && start < window.end
}

/// Filter one source's parse output down to the window and allow-list.
pub fn filter_programmes(
    programmes: Vec<Programme>,
    window: &BroadcastWindow,
    channels: &HashSet<String>,
) -> Vec<Programme> {
    programmes
        .into_iter()
        .filter(|p| retain(p, window, channels))
        .collect()
}

/// Cut a source's channel catalog down to the allow-list, same exact-match
/// rule as programmes. The allow-list names programme channel identifiers
/// and catalog ids share that identifier space.
pub fn filter_channels(channels: Vec<Channel>, allowed: &HashSet<String>) -> Vec<Channel> {
    channels
        .into_iter()
        .filter(|c| allowed.contains(&c.id))
        .collect()
}
