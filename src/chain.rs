//! In-memory mood-chain graph: ordered membership plus a sparse directed
//! weighted transition graph.
//!
//! A `ChainGraph` is loaded whole from the store, mutated here, and saved
//! back as a unit. Membership order is the member's position: the vector
//! index *is* the position, so positions stay a dense `0..N-1` permutation
//! through any sequence of mutations without explicit renumbering.
//! Removing a member cascade-deletes every edge touching it; edges never
//! outlive their endpoints.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Error, Result};
use crate::model::{MoodChain, SongId, TransitionEdge};

/// Weight a brand-new edge gets on its first observed traversal. Above
/// the 0.5 neutral default: one observed play is already weak evidence
/// of preference.
const FIRST_TRAVERSAL_WEIGHT: f64 = 0.6;

/// Reinforcement added per traversal of an existing edge, capped at 1.0.
/// There is no decay term; repeated plays saturate and never decrease.
const TRAVERSAL_REINFORCEMENT: f64 = 0.05;

/// One mood chain's members and learned transitions, fully materialized.
#[derive(Debug, Clone)]
pub struct ChainGraph {
    /// Chain metadata, including play stats this graph mutates.
    pub chain: MoodChain,
    members: Vec<SongId>,
    edges: HashMap<(SongId, SongId), TransitionEdge>,
}

impl ChainGraph {
    /// An empty graph for a chain with no members yet.
    #[must_use]
    pub fn new(chain: MoodChain) -> Self {
        Self {
            chain,
            members: Vec::new(),
            edges: HashMap::new(),
        }
    }

    /// Rebuild a graph from persisted parts. `members` must already be in
    /// position order. Edges whose endpoints are not members are dropped,
    /// so a graph loaded from imperfect data still satisfies the
    /// membership invariant.
    #[must_use]
    pub fn from_parts(
        chain: MoodChain,
        members: Vec<SongId>,
        edges: Vec<TransitionEdge>,
    ) -> Self {
        let mut graph = Self {
            chain,
            members,
            edges: HashMap::new(),
        };
        for edge in edges {
            if graph.is_member(edge.from_song_id) && graph.is_member(edge.to_song_id) {
                graph
                    .edges
                    .insert((edge.from_song_id, edge.to_song_id), edge);
            } else {
                debug!(
                    "dropping edge {} -> {} with non-member endpoint (chain {})",
                    edge.from_song_id, edge.to_song_id, graph.chain.id
                );
            }
        }
        graph
    }

    /// Member song ids in position order.
    #[must_use]
    pub fn members(&self) -> &[SongId] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn is_member(&self, song_id: SongId) -> bool {
        self.members.contains(&song_id)
    }

    /// Position of a member, if present.
    #[must_use]
    pub fn position_of(&self, song_id: SongId) -> Option<usize> {
        self.members.iter().position(|&id| id == song_id)
    }

    /// All edges, in unspecified order.
    pub fn edges(&self) -> impl Iterator<Item = &TransitionEdge> {
        self.edges.values()
    }

    #[must_use]
    pub fn edge(&self, from: SongId, to: SongId) -> Option<&TransitionEdge> {
        self.edges.get(&(from, to))
    }

    /// Learned weights of every edge leaving `from`.
    #[must_use]
    pub fn edges_from(&self, from: SongId) -> HashMap<SongId, f64> {
        self.edges
            .values()
            .filter(|e| e.from_song_id == from)
            .map(|e| (e.to_song_id, e.weight))
            .collect()
    }

    /// Insert a member at `position`, or append when `None`. Members at
    /// or after the requested position shift up by one; a position past
    /// the end appends.
    pub fn add_member(&mut self, song_id: SongId, position: Option<usize>) -> Result<()> {
        if self.is_member(song_id) {
            return Err(Error::SongAlreadyInChain {
                chain_id: self.chain.id,
                song_id,
            });
        }
        let at = position.unwrap_or(self.members.len()).min(self.members.len());
        self.members.insert(at, song_id);
        debug!(
            "chain {}: added song {} at position {}",
            self.chain.id, song_id, at
        );
        Ok(())
    }

    /// Remove a member, cascade-deleting every edge incident to it.
    /// Members after it shift down by one.
    pub fn remove_member(&mut self, song_id: SongId) -> Result<()> {
        let Some(at) = self.position_of(song_id) else {
            return Err(Error::SongNotInChain {
                chain_id: self.chain.id,
                song_id,
            });
        };
        self.members.remove(at);
        let before = self.edges.len();
        self.edges
            .retain(|&(from, to), _| from != song_id && to != song_id);
        debug!(
            "chain {}: removed song {} from position {} ({} incident edges dropped)",
            self.chain.id,
            song_id,
            at,
            before - self.edges.len()
        );
        Ok(())
    }

    /// Replace the member order with `song_ids`, which must be exactly a
    /// permutation of the current membership.
    pub fn reorder(&mut self, song_ids: &[SongId]) -> Result<()> {
        if song_ids.len() != self.members.len() {
            return Err(Error::InvalidArgument(format!(
                "reorder expects {} song ids, got {}",
                self.members.len(),
                song_ids.len()
            )));
        }
        let mut seen = Vec::with_capacity(song_ids.len());
        for &id in song_ids {
            if !self.is_member(id) {
                return Err(Error::InvalidArgument(format!(
                    "song {id} is not a member of chain {}",
                    self.chain.id
                )));
            }
            if seen.contains(&id) {
                return Err(Error::InvalidArgument(format!(
                    "song {id} appears more than once in reorder sequence"
                )));
            }
            seen.push(id);
        }
        self.members = seen;
        Ok(())
    }

    /// Upsert an edge with an explicit weight. Both endpoints must be
    /// current members; the weight must lie in [0.0, 1.0]. Edges are
    /// independent of list positions; the endpoints need not be adjacent.
    pub fn set_edge_weight(&mut self, from: SongId, to: SongId, weight: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::InvalidArgument(format!(
                "edge weight {weight} outside [0.0, 1.0]"
            )));
        }
        for endpoint in [from, to] {
            if !self.is_member(endpoint) {
                return Err(Error::SongNotInChain {
                    chain_id: self.chain.id,
                    song_id: endpoint,
                });
            }
        }
        self.edges
            .entry((from, to))
            .and_modify(|e| e.weight = weight)
            .or_insert(TransitionEdge {
                from_song_id: from,
                to_song_id: to,
                weight,
                play_count: 0,
            });
        Ok(())
    }

    /// Bulk weight update. Pairs with a non-member endpoint or an
    /// out-of-range weight are skipped rather than failing the batch;
    /// returns how many were applied.
    pub fn update_edges(&mut self, updates: &[(SongId, SongId, f64)]) -> usize {
        let mut applied = 0;
        for &(from, to, weight) in updates {
            if self.set_edge_weight(from, to, weight).is_ok() {
                applied += 1;
            }
        }
        applied
    }

    /// Record that playback actually traversed `from -> to`.
    ///
    /// An existing edge is reinforced: play_count increments and weight
    /// grows by a fixed step, capped at 1.0. A missing edge is created at
    /// the first-traversal weight. Either way the chain's own play stats
    /// advance; every traversal counts as a chain play.
    pub fn record_traversal(
        &mut self,
        from: SongId,
        to: SongId,
        at: DateTime<Utc>,
    ) -> Result<&TransitionEdge> {
        for endpoint in [from, to] {
            if !self.is_member(endpoint) {
                return Err(Error::SongNotInChain {
                    chain_id: self.chain.id,
                    song_id: endpoint,
                });
            }
        }
        let edge = self
            .edges
            .entry((from, to))
            .and_modify(|e| {
                e.play_count += 1;
                e.weight = (e.weight + TRAVERSAL_REINFORCEMENT).min(1.0);
            })
            .or_insert(TransitionEdge {
                from_song_id: from,
                to_song_id: to,
                weight: FIRST_TRAVERSAL_WEIGHT,
                play_count: 1,
            });
        self.chain.play_count += 1;
        self.chain.last_played_at = Some(at);
        Ok(edge)
    }
}
