//! Mining a listening-history log into a fresh mood chain.
//!
//! The synthesizer counts plays per song, keeps the songs heard often
//! enough, then walks the log counting transitions between consecutive
//! *valid* plays. An entry for a filtered-out song is skipped, not
//! treated as a break: the previous valid song carries across it.
//! Counts are normalized per source song, so each song's outgoing edges
//! form a distribution summing to 1 over its observed destinations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::chain::ChainGraph;
use crate::model::{MoodChain, PlayEvent, SongId, TransitionEdge, TransitionStyle, UserId};

/// Build a new auto-generated chain from a chronological play log.
///
/// `events` must be in chronological order (the store's history queries
/// return them that way). Only entries inside `[from, to]` participate
/// when a bound is given. Songs played fewer than `min_plays` times are
/// dropped entirely; if nothing qualifies the result is an empty chain
/// rather than an error.
#[must_use]
pub fn synthesize(
    owner_id: UserId,
    name: &str,
    events: &[PlayEvent],
    min_plays: i64,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> ChainGraph {
    let mut chain = MoodChain::new(owner_id, name, TransitionStyle::Smooth);
    chain.is_auto_generated = true;
    chain.source_history_start = from;
    chain.source_history_end = to;

    let windowed: Vec<&PlayEvent> = events
        .iter()
        .filter(|e| from.is_none_or(|f| e.played_at >= f) && to.is_none_or(|t| e.played_at <= t))
        .collect();

    // Raw play counts over the window.
    let mut play_counts: HashMap<SongId, i64> = HashMap::new();
    for event in &windowed {
        *play_counts.entry(event.song_id).or_insert(0) += 1;
    }

    let valid: HashMap<SongId, i64> = play_counts
        .into_iter()
        .filter(|&(_, count)| count >= min_plays)
        .collect();

    if valid.is_empty() {
        info!(
            "no songs reached {min_plays} plays in {} log entries, synthesizing empty chain",
            windowed.len()
        );
        return ChainGraph::new(chain);
    }

    // Count transitions between consecutive valid plays. The previous
    // valid song survives across filtered-out entries in between.
    let mut transition_counts: HashMap<(SongId, SongId), i64> = HashMap::new();
    let mut prev: Option<SongId> = None;
    for event in &windowed {
        if valid.contains_key(&event.song_id) {
            if let Some(p) = prev {
                *transition_counts.entry((p, event.song_id)).or_insert(0) += 1;
            }
            prev = Some(event.song_id);
        }
    }

    // Per-source normalization: outgoing weights of one song sum to 1.
    let mut outgoing_totals: HashMap<SongId, i64> = HashMap::new();
    for (&(from_id, _), &count) in &transition_counts {
        *outgoing_totals.entry(from_id).or_insert(0) += count;
    }
    let edges: Vec<TransitionEdge> = transition_counts
        .iter()
        .map(|(&(from_id, to_id), &count)| TransitionEdge {
            from_song_id: from_id,
            to_song_id: to_id,
            weight: count as f64 / outgoing_totals[&from_id] as f64,
            play_count: 0,
        })
        .collect();

    // Most-played songs first; ties broken by id for determinism.
    let mut members: Vec<SongId> = valid.keys().copied().collect();
    members.sort_by_key(|id| (std::cmp::Reverse(valid[id]), *id));

    debug!(
        "synthesized chain '{name}' with {} members and {} edges from {} entries",
        members.len(),
        edges.len(),
        windowed.len()
    );

    ChainGraph::from_parts(chain, members, edges)
}
