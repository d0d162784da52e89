//! Shared data types for the transition engine and recommender.
//!
//! Everything here is a plain record: the store loads these, the engine
//! computes over them, and the caller gets them back. Mutations to song
//! metadata happen in services outside this crate; a [`SongProfile`] is
//! read-only input as far as scoring is concerned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database row identifier for songs.
pub type SongId = i64;
/// Database row identifier for users.
pub type UserId = i64;
/// Database row identifier for mood chains.
pub type ChainId = i64;

/// The feature record the scorer and suggestion engine read.
///
/// `bpm`, `energy`, `valence` and `genre` are optional because metadata
/// extraction does not always produce them; a scoring factor only
/// participates when both songs carry the attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongProfile {
    pub id: SongId,
    pub owner_id: UserId,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    /// Beats per minute, when extracted.
    pub bpm: Option<i64>,
    /// Perceived intensity in [0, 1].
    pub energy: Option<f64>,
    /// Musical positivity in [0, 1].
    pub valence: Option<f64>,
    pub duration_seconds: i64,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
}

/// Policy for weighting next-song candidates when no learned edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    Smooth,
    Random,
    EnergyFlow,
    GenreMatch,
}

impl TransitionStyle {
    /// Stable name used in the database and on the CLI.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::Random => "random",
            Self::EnergyFlow => "energy_flow",
            Self::GenreMatch => "genre_match",
        }
    }

    /// Inverse of [`as_str`](Self::as_str). Unknown names fall back to
    /// `Smooth`, the schema default.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "random" => Self::Random,
            "energy_flow" => Self::EnergyFlow,
            "genre_match" => Self::GenreMatch,
            _ => Self::Smooth,
        }
    }
}

impl Default for TransitionStyle {
    fn default() -> Self {
        Self::Smooth
    }
}

/// Mood chain metadata. Membership and edges live in
/// [`ChainGraph`](crate::chain::ChainGraph), not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodChain {
    pub id: ChainId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub transition_style: TransitionStyle,
    pub is_auto_generated: bool,
    /// Start of the history window a synthesized chain was mined from.
    pub source_history_start: Option<DateTime<Utc>>,
    /// End of that window.
    pub source_history_end: Option<DateTime<Utc>>,
    /// Member count, denormalized at save time for cheap listings.
    pub song_count: i64,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl MoodChain {
    /// A fresh, manually curated chain with no plays yet.
    #[must_use]
    pub fn new(owner_id: UserId, name: &str, style: TransitionStyle) -> Self {
        Self {
            id: 0,
            owner_id,
            name: name.to_string(),
            description: None,
            transition_style: style,
            is_auto_generated: false,
            source_history_start: None,
            source_history_end: None,
            song_count: 0,
            play_count: 0,
            last_played_at: None,
        }
    }
}

/// A directed affinity between two member songs of one chain.
///
/// Edges are created lazily; absence means "no learned preference",
/// not zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionEdge {
    pub from_song_id: SongId,
    pub to_song_id: SongId,
    /// Learned affinity in [0.0, 1.0].
    pub weight: f64,
    /// Times this exact transition was traversed during playback.
    pub play_count: i64,
}

/// One row of the listening history log, chronological per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayEvent {
    pub user_id: UserId,
    pub song_id: SongId,
    pub played_at: DateTime<Utc>,
    /// Song that played immediately before, when the player knew it.
    pub previous_song_id: Option<SongId>,
}

/// A ranked next-song candidate out of the suggestion engine.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub song_id: SongId,
    pub title: String,
    pub artist: Option<String>,
    pub weight: f64,
    pub reason: &'static str,
}

/// A candidate scored against a source song, with the qualitative tags
/// that contributed.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSong {
    pub song: SongProfile,
    pub score: f64,
    pub reasons: Vec<String>,
}

/// The three discover groupings, each already ordered and truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverSections {
    /// High play count, not heard in over 30 days (or never).
    pub long_time_no_listen: Vec<SongProfile>,
    /// Closest on average to the user's top five songs.
    pub based_on_favorite: Vec<SongProfile>,
    /// Rarely played songs that still resemble the favorites.
    pub hidden_gems: Vec<SongProfile>,
}

/// Result of building a personal mix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalMix {
    pub songs: Vec<SongProfile>,
    pub total_duration_seconds: i64,
}

/// Energy-band filter for personal mixes. Songs without an energy value
/// always pass, so sparse libraries still fill a mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Energetic,
    Calm,
    Focus,
}

impl Mood {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Energetic => "energetic",
            Self::Calm => "calm",
            Self::Focus => "focus",
        }
    }

    /// Whether a song's energy falls in this mood's band.
    #[must_use]
    pub fn admits(&self, energy: Option<f64>) -> bool {
        match (self, energy) {
            (_, None) => true,
            (Self::Energetic, Some(e)) => e >= 0.6,
            (Self::Calm, Some(e)) => e <= 0.4,
            (Self::Focus, Some(e)) => (0.3..=0.7).contains(&e),
        }
    }
}
