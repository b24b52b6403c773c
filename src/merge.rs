//! Combining filtered programme sequences from several sources
//!
//! Sources are listed in priority order in the config; the first source is
//! the most trusted. Two policies exist because mirrors overlap in channel
//! coverage but differ in metadata quality.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::xmltv::{Channel, Programme};

/// How per-source results are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Each channel is claimed by the first source that contributes any record
    /// for it; later sources' records for that channel are dropped even when
    /// they cover different time slots. Keeps metadata style consistent per
    /// channel while letting fallback sources fill channels the primary lacks.
    #[default]
    FirstWins,
    /// Append everything in priority order, dropping exact duplicates
    /// (same channel + start + stop); the first occurrence wins.
    Concatenate,
}

/// Merge per-source sequences into one, preserving per-source record order.
pub fn merge(per_source: Vec<Vec<Programme>>, policy: MergePolicy) -> Vec<Programme> {
    match policy {
        MergePolicy::FirstWins => first_wins(per_source),
        MergePolicy::Concatenate => concatenate(per_source),
    }
}

fn first_wins(per_source: Vec<Vec<Programme>>) -> Vec<Programme> {
    let mut claimed: HashMap<String, usize> = HashMap::new();
    let mut merged = Vec::new();

    for (index, programmes) in per_source.into_iter().enumerate() {
        for programme in programmes {
            let owner = *claimed.entry(programme.channel.clone()).or_insert(index);
            if owner == index {
                merged.push(programme);
            }
        }
    }

    merged
}

fn concatenate(per_source: Vec<Vec<Programme>>) -> Vec<Programme> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut merged = Vec::new();

    for programmes in per_source {
        for programme in programmes {
            let key = (
                programme.channel.clone(),
                programme.start_raw.clone(),
                programme.stop_raw.clone(),
            );
            if seen.insert(key) {
                merged.push(programme);
            }
        }
    }

    merged
}

/// Merge per-source channel catalogs: one entry per id, the first source to
/// describe a channel wins under either policy.
pub fn merge_channels(per_source: Vec<Vec<Channel>>) -> Vec<Channel> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for channels in per_source {
        for channel in channels {
            if seen.insert(channel.id.clone()) {
                merged.push(channel);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prog(channel: &str, start_raw: &str, title: &str) -> Programme {
        Programme {
            channel: channel.to_string(),
            start: None,
            stop: None,
            start_raw: start_raw.to_string(),
            stop_raw: String::new(),
            title: title.to_string(),
            sub_title: String::new(),
            desc: String::new(),
            category: String::new(),
            icon: None,
            episode_num: None,
        }
    }

    #[test]
    fn first_wins_claims_channels_by_source_priority() {
        let source_a = vec![prog("X", "1", "a1"), prog("X", "2", "a2")];
        let source_b = vec![
            prog("X", "3", "b1"),
            prog("X", "4", "b2"),
            prog("X", "5", "b3"),
            prog("Y", "1", "b4"),
        ];

        let merged = merge(vec![source_a, source_b], MergePolicy::FirstWins);
        let titles: Vec<&str> = merged.iter().map(|p| p.title.as_str()).collect();

        // Only A's records for X survive, however many B carried; B still
        // contributes the channel A lacked.
        assert_eq!(titles, ["a1", "a2", "b4"]);
    }

    #[test]
    fn first_wins_on_single_source_is_identity() {
        let source = vec![prog("X", "1", "a1"), prog("Y", "1", "a2")];
        let merged = merge(vec![source], MergePolicy::FirstWins);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn concatenate_drops_exact_duplicates_only() {
        let source_a = vec![prog("X", "1", "a1")];
        let source_b = vec![prog("X", "1", "b-dup"), prog("X", "2", "b-new")];

        let merged = merge(vec![source_a, source_b], MergePolicy::Concatenate);
        let titles: Vec<&str> = merged.iter().map(|p| p.title.as_str()).collect();

        // The duplicate slot keeps the first source's record; the new slot
        // from the second source is kept.
        assert_eq!(titles, ["a1", "b-new"]);
    }

    #[test]
    fn channel_catalogs_dedupe_by_id_with_source_priority() {
        let chan = |id: &str, name: &str| Channel {
            id: id.to_string(),
            display_name: name.to_string(),
            icon: None,
        };

        let source_a = vec![chan("X", "X from A")];
        let source_b = vec![chan("X", "X from B"), chan("Y", "Y from B")];

        let merged = merge_channels(vec![source_a, source_b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].display_name, "X from A");
        assert_eq!(merged[1].display_name, "Y from B");
    }

    #[test]
    fn merge_policy_deserializes_from_kebab_case() {
        assert_eq!(
            serde_json::from_str::<MergePolicy>("\"first-wins\"").unwrap(),
            MergePolicy::FirstWins
        );
        assert_eq!(
            serde_json::from_str::<MergePolicy>("\"concatenate\"").unwrap(),
            MergePolicy::Concatenate
        );
    }
}
