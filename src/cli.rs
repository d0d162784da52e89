//! Command-line interface definitions.
//!
//! Everything is routed through subcommands; global flags pick the
//! database file and the acting user. Commands that involve randomness
//! (`suggest` on random-style chains, `mix`) accept a `--seed` so runs
//! can be reproduced.
//!
//! ## Examples
//!
//! ```bash
//! segue add-song --title "So What" --artist "Miles Davis" --genre Jazz
//! segue chain create "late night" --style smooth
//! segue suggest 1 4 --limit 5
//! segue mix energetic --minutes 45
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::{Mood, TransitionStyle};

/// Main application arguments.
#[derive(Parser)]
#[command(name = "segue")]
#[command(about = "Segue - mood-chain transitions and recommendations for your music library")]
#[command(version)]
pub struct Args {
    /// Path to the library database (defaults to the platform data dir)
    #[arg(long, env = "SEGUE_DB", global = true)]
    pub db: Option<PathBuf>,

    /// User id to act as
    #[arg(long, env = "SEGUE_USER", global = true, default_value_t = 1)]
    pub user: i64,

    #[command(subcommand)]
    pub command: Command,
}

/// Transition style, as accepted on the command line.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum StyleArg {
    Smooth,
    Random,
    EnergyFlow,
    GenreMatch,
}

impl From<StyleArg> for TransitionStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Smooth => Self::Smooth,
            StyleArg::Random => Self::Random,
            StyleArg::EnergyFlow => Self::EnergyFlow,
            StyleArg::GenreMatch => Self::GenreMatch,
        }
    }
}

/// Mood band for personal mixes.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum MoodArg {
    Energetic,
    Calm,
    Focus,
}

impl From<MoodArg> for Mood {
    fn from(mood: MoodArg) -> Self {
        match mood {
            MoodArg::Energetic => Self::Energetic,
            MoodArg::Calm => Self::Calm,
            MoodArg::Focus => Self::Focus,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the library database and report its location
    Init,

    /// Add a song record to the library
    AddSong {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        /// Beats per minute
        #[arg(long)]
        bpm: Option<i64>,
        /// Perceived intensity, 0.0 to 1.0
        #[arg(long)]
        energy: Option<f64>,
        /// Musical positivity, 0.0 to 1.0
        #[arg(long)]
        valence: Option<f64>,
        #[arg(long, default_value_t = 0)]
        duration_seconds: i64,
    },

    /// List all songs in the library
    Songs,

    /// Append a play to the listening history
    LogPlay {
        song_id: i64,
        /// Timestamp of the play, RFC 3339; defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the listening history, oldest first
    History {
        /// Only the most recent N entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Manage mood chains
    Chain {
        #[command(subcommand)]
        action: ChainAction,
    },

    /// Rank follow-up songs for the current song in a chain
    Suggest {
        chain_id: i64,
        current_song_id: i64,
        /// Cap the number of suggestions returned
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Seed for the random style, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Mine the listening history into a new auto-generated chain
    Synthesize {
        name: String,
        /// Minimum plays for a song to join the chain
        #[arg(long, default_value_t = 2)]
        min_plays: i64,
        /// Start of the history window, RFC 3339
        #[arg(long)]
        from: Option<String>,
        /// End of the history window, RFC 3339
        #[arg(long)]
        to: Option<String>,
    },

    /// Songs most similar to the given song
    Similar {
        song_id: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Discover sections: forgotten favorites, taste matches, hidden gems
    Discover {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Build a personal mix, optionally filtered to a mood's energy band
    Mix {
        /// Mood band; omit to draw from the whole library
        mood: Option<MoodArg>,
        /// Target length in minutes
        #[arg(long, default_value_t = 60)]
        minutes: i64,
        /// Seed the shuffle, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Songs most often played right after the given song
    Together {
        song_id: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum ChainAction {
    /// Create an empty chain
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value = "smooth")]
        style: StyleArg,
    },

    /// List all chains
    List,

    /// Show one chain with its members and edges
    Show { chain_id: i64 },

    /// Delete a chain
    Delete { chain_id: i64 },

    /// Add a song to a chain
    Add {
        chain_id: i64,
        song_id: i64,
        /// Insert at this position instead of appending
        #[arg(long)]
        position: Option<usize>,
    },

    /// Remove a song from a chain
    Remove { chain_id: i64, song_id: i64 },

    /// Reorder a chain; expects the full membership as song ids
    Reorder {
        chain_id: i64,
        #[arg(required = true)]
        song_ids: Vec<i64>,
    },

    /// Set the weight of one transition edge
    SetWeight {
        chain_id: i64,
        from_song_id: i64,
        to_song_id: i64,
        weight: f64,
    },

    /// Record an actually-played transition, reinforcing its edge
    Record {
        chain_id: i64,
        from_song_id: i64,
        to_song_id: i64,
    },
}
