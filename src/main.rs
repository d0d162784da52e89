//! Segue command-line entry point.
//!
//! Parses arguments, opens the library database, and routes each
//! subcommand to the engine. Structured results are printed as pretty
//! JSON so output can be piped into `jq` or other tooling.
//!
//! Logging is controlled via `RUST_LOG`:
//! - `RUST_LOG=debug segue suggest 1 4`
//! - `RUST_LOG=segue::recommend=trace segue discover`

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use segue::cache::NoopCache;
use segue::cli::{Args, ChainAction, Command};
use segue::config::RuntimeConfig;
use segue::model::SongProfile;
use segue::recommend::Recommender;
use segue::store::Library;

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid RFC 3339 timestamp: {s}"))
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = match args.db {
        Some(path) => RuntimeConfig::with_db_path(path),
        None => RuntimeConfig::new()?,
    };
    let user = args.user;
    let mut library = Library::open(&config.db_path)
        .with_context(|| format!("failed to open library at {}", config.db_path.display()))?;

    // One-shot runs exit before a cached entry could be read back.
    let cache = NoopCache;
    let recommender = Recommender::new(&cache);

    match args.command {
        Command::Init => {
            // Opening above already created the schema.
            println!("library ready at {}", config.db_path.display());
        }
        Command::AddSong {
            title,
            artist,
            album,
            genre,
            bpm,
            energy,
            valence,
            duration_seconds,
        } => {
            let id = library.add_song(&SongProfile {
                id: 0,
                owner_id: user,
                title,
                artist,
                album,
                genre,
                bpm,
                energy,
                valence,
                duration_seconds,
                play_count: 0,
                last_played_at: None,
            })?;
            println!("added song {id}");
        }
        Command::Songs => {
            print_json(&library.songs(user)?)?;
        }
        Command::LogPlay { song_id, at } => {
            let at = at.as_deref().map(parse_timestamp).transpose()?;
            let event = library.record_play(user, song_id, at.unwrap_or_else(Utc::now))?;
            print_json(&event)?;
        }
        Command::History { limit } => {
            print_json(&library.history(user, limit)?)?;
        }
        Command::Chain { action } => run_chain(&mut library, user, action)?,
        Command::Suggest {
            chain_id,
            current_song_id,
            limit,
            seed,
        } => {
            let mut rng = rng_from_seed(seed);
            let suggestions =
                library.suggest_for_chain(user, chain_id, current_song_id, limit, &mut rng)?;
            print_json(&suggestions)?;
        }
        Command::Synthesize {
            name,
            min_plays,
            from,
            to,
        } => {
            let from = from.as_deref().map(parse_timestamp).transpose()?;
            let to = to.as_deref().map(parse_timestamp).transpose()?;
            let graph = library.synthesize_chain(user, &name, min_plays, from, to)?;
            info!(
                "synthesized chain {} with {} members",
                graph.chain.id,
                graph.len()
            );
            print_json(&graph.chain)?;
        }
        Command::Similar { song_id, limit } => {
            let source = library.song(user, song_id)?;
            let songs = library.songs(user)?;
            print_json(&recommender.similar_songs(user, &source, &songs, limit))?;
        }
        Command::Discover { limit } => {
            let songs = library.songs(user)?;
            print_json(&recommender.discover(user, &songs, limit, Utc::now()))?;
        }
        Command::Mix {
            mood,
            minutes,
            seed,
        } => {
            let songs = library.songs(user)?;
            let mut rng = rng_from_seed(seed);
            print_json(&recommender.personal_mix(user, mood.map(Into::into), &songs, minutes, &mut rng))?;
        }
        Command::Together { song_id, limit } => {
            // Validate the song exists before scanning the log.
            library.song(user, song_id)?;
            let history = library.history(user, None)?;
            let pairs = recommender.frequently_played_together(song_id, &history, limit);
            print_json(&pairs)?;
        }
    }

    Ok(())
}

fn run_chain(library: &mut Library, user: i64, action: ChainAction) -> Result<()> {
    match action {
        ChainAction::Create {
            name,
            description,
            style,
        } => {
            let graph = library.create_chain(user, &name, description.as_deref(), style.into())?;
            println!("created chain {}", graph.chain.id);
        }
        ChainAction::List => {
            print_json(&library.chains(user)?)?;
        }
        ChainAction::Show { chain_id } => {
            let graph = library.load_chain(user, chain_id)?;
            print_json(&serde_json::json!({
                "chain": graph.chain,
                "members": graph.members(),
                "edges": graph.edges().collect::<Vec<_>>(),
            }))?;
        }
        ChainAction::Delete { chain_id } => {
            library.delete_chain(user, chain_id)?;
            println!("deleted chain {chain_id}");
        }
        ChainAction::Add {
            chain_id,
            song_id,
            position,
        } => {
            // Validate the song before touching the chain.
            library.song(user, song_id)?;
            let mut graph = library.load_chain(user, chain_id)?;
            graph.add_member(song_id, position)?;
            library.save_chain(&mut graph)?;
            println!("added song {song_id} to chain {chain_id}");
        }
        ChainAction::Remove { chain_id, song_id } => {
            let mut graph = library.load_chain(user, chain_id)?;
            graph.remove_member(song_id)?;
            library.save_chain(&mut graph)?;
            println!("removed song {song_id} from chain {chain_id}");
        }
        ChainAction::Reorder { chain_id, song_ids } => {
            let mut graph = library.load_chain(user, chain_id)?;
            graph.reorder(&song_ids)?;
            library.save_chain(&mut graph)?;
            println!("reordered chain {chain_id}");
        }
        ChainAction::SetWeight {
            chain_id,
            from_song_id,
            to_song_id,
            weight,
        } => {
            let mut graph = library.load_chain(user, chain_id)?;
            graph.set_edge_weight(from_song_id, to_song_id, weight)?;
            library.save_chain(&mut graph)?;
            println!("set weight {weight} on {from_song_id} -> {to_song_id}");
        }
        ChainAction::Record {
            chain_id,
            from_song_id,
            to_song_id,
        } => {
            let edge =
                library.record_traversal(user, chain_id, from_song_id, to_song_id, Utc::now())?;
            print_json(&edge)?;
        }
    }
    Ok(())
}
