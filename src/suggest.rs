//! Next-song suggestion ranking for a mood chain.
//!
//! Every chain member other than the current song becomes a candidate.
//! A learned transition edge always wins; otherwise the chain's
//! transition style decides how the candidate is weighted. The engine is
//! pure over its inputs; randomness for the `Random` style comes from a
//! caller-provided generator so tests can seed it.

use std::collections::HashMap;

use log::debug;
use rand::Rng;

use crate::chain::ChainGraph;
use crate::model::{SongId, SongProfile, Suggestion, TransitionStyle};

/// Weight used when a style has no data to work with (missing energy,
/// valence, or genre on either side).
const DEFAULT_WEIGHT: f64 = 0.5;

/// Rank every other chain member as a follow-up to `current`.
///
/// `songs` maps member ids to their profiles; members without a profile
/// are skipped. `current` does not have to be a chain member.
///
/// `exclude_recent` caps the number of returned suggestions when
/// positive. Despite the name it is a plain result-size truncation, not
/// a recency filter; the historical behavior is kept as-is.
#[must_use]
pub fn suggest_next<R: Rng + ?Sized>(
    graph: &ChainGraph,
    songs: &HashMap<SongId, SongProfile>,
    current: &SongProfile,
    exclude_recent: usize,
    rng: &mut R,
) -> Vec<Suggestion> {
    let learned = graph.edges_from(current.id);
    let mut suggestions: Vec<Suggestion> = Vec::with_capacity(graph.len());

    for &member_id in graph.members() {
        if member_id == current.id {
            continue;
        }
        let Some(candidate) = songs.get(&member_id) else {
            debug!("no profile loaded for chain member {member_id}, skipping");
            continue;
        };

        let (weight, reason) = match learned.get(&member_id) {
            Some(&w) => (w, "high transition weight"),
            None => style_weight(graph.chain.transition_style, current, candidate, rng),
        };

        suggestions.push(Suggestion {
            song_id: candidate.id,
            title: candidate.title.clone(),
            artist: candidate.artist.clone(),
            weight,
            reason,
        });
    }

    // Stable sort keeps member order as the tiebreak.
    suggestions.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if exclude_recent > 0 && suggestions.len() > exclude_recent {
        suggestions.truncate(exclude_recent);
    }

    suggestions
}

/// Style-policy weighting for a candidate with no learned edge.
fn style_weight<R: Rng + ?Sized>(
    style: TransitionStyle,
    current: &SongProfile,
    candidate: &SongProfile,
    rng: &mut R,
) -> (f64, &'static str) {
    match style {
        TransitionStyle::Smooth => {
            if let (Some(ce), Some(cv), Some(ke), Some(kv)) = (
                current.energy,
                current.valence,
                candidate.energy,
                candidate.valence,
            ) {
                let similarity = 1.0 - ((ke - ce).abs() + (kv - cv).abs()) / 2.0;
                (similarity.max(0.0), "similar energy/valence")
            } else {
                (DEFAULT_WEIGHT, "default suggestion")
            }
        }
        TransitionStyle::EnergyFlow => {
            if let (Some(ce), Some(ke)) = (current.energy, candidate.energy) {
                if ke >= ce {
                    (0.7 + (ke - ce) * 0.3, "increasing energy")
                } else {
                    (0.3, "lower energy")
                }
            } else {
                (DEFAULT_WEIGHT, "default suggestion")
            }
        }
        TransitionStyle::GenreMatch => {
            match (current.genre.as_deref(), candidate.genre.as_deref()) {
                // Deliberately case-sensitive, unlike the similarity
                // scorer's genre factor.
                (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
                    if a == b {
                        (0.9, "same genre")
                    } else {
                        (0.3, "different genre")
                    }
                }
                _ => (DEFAULT_WEIGHT, "default suggestion"),
            }
        }
        TransitionStyle::Random => (rng.gen::<f64>(), "random selection"),
    }
}
