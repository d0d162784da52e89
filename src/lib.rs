//! Mood-chain transitions and recommendations for a personal music
//! library.
//!
//! A *mood chain* is an ordered set of songs plus a sparse directed
//! graph of weighted transitions between them. Playing through a chain
//! reinforces the transitions actually taken, so the chain gradually
//! learns which song follows which.
//!
//! Core modules:
//! - [`similarity`] - Multi-factor song similarity scoring
//! - [`chain`] - The in-memory chain graph and its mutations
//! - [`suggest`] - Next-song ranking over a chain
//! - [`synth`] - Mining listening history into a new chain
//! - [`recommend`] - Library-wide recommendations with caching
//! - [`store`] - SQLite persistence
//!
//! ### Supporting modules
//!
//! - [`model`] - Shared data types
//! - [`error`] - Domain error types
//! - [`cache`] - Best-effort result cache
//! - [`config`] - Data directory and runtime settings
//! - [`cli`] - Command-line interface definitions
//!
//! ## Quick start
//!
//! ```no_run
//! use segue::model::{SongProfile, TransitionStyle};
//! use segue::store::Library;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! # fn main() -> segue::error::Result<()> {
//! let mut library = Library::open_in_memory()?;
//!
//! let a = library.add_song(&SongProfile {
//!     id: 0,
//!     owner_id: 1,
//!     title: "So What".into(),
//!     artist: Some("Miles Davis".into()),
//!     album: None,
//!     genre: Some("Jazz".into()),
//!     bpm: Some(136),
//!     energy: Some(0.4),
//!     valence: Some(0.6),
//!     duration_seconds: 545,
//!     play_count: 0,
//!     last_played_at: None,
//! })?;
//!
//! let mut graph = library.create_chain(1, "late night", None, TransitionStyle::Smooth)?;
//! graph.add_member(a, None)?;
//! library.save_chain(&mut graph)?;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let suggestions = library.suggest_for_chain(1, graph.chain.id, a, 0, &mut rng)?;
//! println!("{} follow-up candidates", suggestions.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Learning model
//!
//! - A transition played for the first time creates its edge at weight
//!   0.6, just above the 0.5 neutral default used for unlearned pairs.
//! - Each further traversal adds 0.05, saturating at 1.0. There is no
//!   decay; a chain only forgets an edge when a member is removed.
//! - Synthesized chains start from normalized history counts instead,
//!   so each song's outgoing weights form a distribution.
//!
//! ## Error handling
//!
//! Library functions return [`error::Result`]. Not-found and conflict
//! conditions are distinguishable via [`error::Error::is_not_found`]
//! and [`error::Error::is_conflict`] so boundary layers can map them to
//! different statuses. The binary wraps everything in `anyhow` for
//! human-readable context.

pub mod cache;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod recommend;
pub mod similarity;
pub mod store;
pub mod suggest;
pub mod synth;
