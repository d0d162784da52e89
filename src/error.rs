//! Error types for the segue library.
//!
//! These are domain conditions, not transport codes: a boundary layer
//! (HTTP handlers, the CLI) decides how each maps to a user-facing
//! status. Everything here is deterministic for a given input and
//! persisted state, so retrying at this layer is never useful.

use crate::model::{ChainId, SongId};
use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Domain errors raised by the transition engine and recommender.
#[derive(Error, Debug)]
pub enum Error {
    /// Mood chain does not exist or is not owned by the caller.
    #[error("mood chain not found: {0}")]
    MoodChainNotFound(ChainId),

    /// Song does not exist or is not owned by the caller.
    #[error("song not found: {0}")]
    SongNotFound(SongId),

    /// Attempt to add a song that is already a chain member.
    #[error("song {song_id} is already in mood chain {chain_id}")]
    SongAlreadyInChain { chain_id: ChainId, song_id: SongId },

    /// Attempt to remove (or reference) a song that is not a member.
    #[error("song {song_id} is not in mood chain {chain_id}")]
    SongNotInChain { chain_id: ChainId, song_id: SongId },

    /// Caller-supplied argument violates a contract, e.g. a reorder
    /// sequence that is not a permutation of the current membership.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying SQLite failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl Error {
    /// True for the "referenced entity does not exist" family, which a
    /// boundary layer typically maps to 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MoodChainNotFound(_) | Self::SongNotFound(_) | Self::SongNotInChain { .. }
        )
    }

    /// True for duplicate-insertion conflicts, distinguishable from the
    /// not-found family so the boundary can pick a different status.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SongAlreadyInChain { .. })
    }
}
