//! SQLite persistence for songs, chains, and the listening history.
//!
//! Chains are coarse-grained: a graph is loaded whole and saved whole,
//! each inside a single transaction, so concurrent writers can never
//! interleave half a membership update with half an edge update. The
//! song and history tables are row-oriented as usual.
//!
//! Every read is scoped by owner id. A row that exists but belongs to
//! someone else is indistinguishable from a missing row, by design of
//! the not-found errors.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::chain::ChainGraph;
use crate::error::{Error, Result};
use crate::model::{
    ChainId, MoodChain, PlayEvent, SongId, SongProfile, Suggestion, TransitionEdge,
    TransitionStyle, UserId,
};
use crate::suggest;
use crate::synth;

/// Handle to one library database.
pub struct Library {
    conn: Connection,
}

impl Library {
    /// Open (creating if needed) the database at `path` and ensure the
    /// schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let lib = Self { conn };
        lib.init_schema()?;
        info!("opened library database at {}", path.display());
        Ok(lib)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let lib = Self { conn };
        lib.init_schema()?;
        Ok(lib)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS songs (
                id               INTEGER PRIMARY KEY,
                owner_id         INTEGER NOT NULL,
                title            TEXT    NOT NULL,
                artist           TEXT,
                album            TEXT,
                genre            TEXT,
                bpm              INTEGER,
                energy           REAL,
                valence          REAL,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                play_count       INTEGER NOT NULL DEFAULT 0,
                last_played_at   TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_songs_owner ON songs(owner_id);

            CREATE TABLE IF NOT EXISTS mood_chains (
                id                   INTEGER PRIMARY KEY,
                owner_id             INTEGER NOT NULL,
                name                 TEXT    NOT NULL,
                description          TEXT,
                transition_style     TEXT    NOT NULL DEFAULT 'smooth',
                is_auto_generated    INTEGER NOT NULL DEFAULT 0,
                source_history_start TEXT,
                source_history_end   TEXT,
                song_count           INTEGER NOT NULL DEFAULT 0,
                play_count           INTEGER NOT NULL DEFAULT 0,
                last_played_at       TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_chains_owner ON mood_chains(owner_id);

            CREATE TABLE IF NOT EXISTS mood_chain_songs (
                chain_id INTEGER NOT NULL REFERENCES mood_chains(id) ON DELETE CASCADE,
                song_id  INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                UNIQUE (chain_id, song_id)
            );

            CREATE TABLE IF NOT EXISTS mood_chain_transitions (
                chain_id     INTEGER NOT NULL REFERENCES mood_chains(id) ON DELETE CASCADE,
                from_song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
                to_song_id   INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
                weight       REAL    NOT NULL,
                play_count   INTEGER NOT NULL DEFAULT 0,
                UNIQUE (chain_id, from_song_id, to_song_id)
            );

            CREATE TABLE IF NOT EXISTS listening_history (
                id               INTEGER PRIMARY KEY,
                user_id          INTEGER NOT NULL,
                song_id          INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
                played_at        TEXT    NOT NULL,
                previous_song_id INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_history_user ON listening_history(user_id, played_at);",
        )?;
        Ok(())
    }

    // ---- songs -----------------------------------------------------

    /// Insert a song record, returning its new id. The `id` field of the
    /// input is ignored.
    pub fn add_song(&self, song: &SongProfile) -> Result<SongId> {
        self.conn.execute(
            "INSERT INTO songs (owner_id, title, artist, album, genre, bpm, energy, valence,
                                duration_seconds, play_count, last_played_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                song.owner_id,
                song.title,
                song.artist,
                song.album,
                song.genre,
                song.bpm,
                song.energy,
                song.valence,
                song.duration_seconds,
                song.play_count,
                song.last_played_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch one of the owner's songs.
    pub fn song(&self, owner_id: UserId, song_id: SongId) -> Result<SongProfile> {
        self.conn
            .query_row(
                &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1 AND owner_id = ?2"),
                params![song_id, owner_id],
                song_from_row,
            )
            .optional()?
            .ok_or(Error::SongNotFound(song_id))
    }

    /// Every song the owner has, in insertion order.
    pub fn songs(&self, owner_id: UserId) -> Result<Vec<SongProfile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SONG_COLUMNS} FROM songs WHERE owner_id = ?1 ORDER BY id"))?;
        let rows = stmt.query_map(params![owner_id], song_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The owner's songs for a set of ids, keyed by id. Missing ids are
    /// simply absent from the map.
    pub fn songs_by_ids(
        &self,
        owner_id: UserId,
        ids: &[SongId],
    ) -> Result<HashMap<SongId, SongProfile>> {
        let mut out = HashMap::with_capacity(ids.len());
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1 AND owner_id = ?2"))?;
        for &id in ids {
            if let Some(song) = stmt
                .query_row(params![id, owner_id], song_from_row)
                .optional()?
            {
                out.insert(id, song);
            }
        }
        Ok(out)
    }

    // ---- chains ----------------------------------------------------

    /// Persist a whole graph in one transaction.
    ///
    /// A graph whose chain id is zero is inserted and gets a fresh id
    /// written back; otherwise the existing rows are replaced. Members
    /// and edges are rewritten wholesale either way.
    pub fn save_chain(&mut self, graph: &mut ChainGraph) -> Result<ChainId> {
        graph.chain.song_count = graph.len() as i64;
        let tx = self.conn.transaction()?;

        if graph.chain.id == 0 {
            tx.execute(
                "INSERT INTO mood_chains (owner_id, name, description, transition_style,
                                          is_auto_generated, source_history_start,
                                          source_history_end, song_count, play_count,
                                          last_played_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    graph.chain.owner_id,
                    graph.chain.name,
                    graph.chain.description,
                    graph.chain.transition_style.as_str(),
                    graph.chain.is_auto_generated,
                    graph.chain.source_history_start,
                    graph.chain.source_history_end,
                    graph.chain.song_count,
                    graph.chain.play_count,
                    graph.chain.last_played_at,
                ],
            )?;
            graph.chain.id = tx.last_insert_rowid();
        } else {
            let changed = tx.execute(
                "UPDATE mood_chains SET name = ?1, description = ?2, transition_style = ?3,
                        is_auto_generated = ?4, source_history_start = ?5,
                        source_history_end = ?6, song_count = ?7, play_count = ?8,
                        last_played_at = ?9
                 WHERE id = ?10 AND owner_id = ?11",
                params![
                    graph.chain.name,
                    graph.chain.description,
                    graph.chain.transition_style.as_str(),
                    graph.chain.is_auto_generated,
                    graph.chain.source_history_start,
                    graph.chain.source_history_end,
                    graph.chain.song_count,
                    graph.chain.play_count,
                    graph.chain.last_played_at,
                    graph.chain.id,
                    graph.chain.owner_id,
                ],
            )?;
            if changed == 0 {
                return Err(Error::MoodChainNotFound(graph.chain.id));
            }
        }

        let chain_id = graph.chain.id;
        tx.execute(
            "DELETE FROM mood_chain_songs WHERE chain_id = ?1",
            params![chain_id],
        )?;
        tx.execute(
            "DELETE FROM mood_chain_transitions WHERE chain_id = ?1",
            params![chain_id],
        )?;
        {
            let mut insert_member = tx.prepare(
                "INSERT INTO mood_chain_songs (chain_id, song_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, &song_id) in graph.members().iter().enumerate() {
                insert_member.execute(params![chain_id, song_id, position as i64])?;
            }
            let mut insert_edge = tx.prepare(
                "INSERT INTO mood_chain_transitions (chain_id, from_song_id, to_song_id, weight, play_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for edge in graph.edges() {
                insert_edge.execute(params![
                    chain_id,
                    edge.from_song_id,
                    edge.to_song_id,
                    edge.weight,
                    edge.play_count,
                ])?;
            }
        }
        tx.commit()?;
        debug!(
            "saved chain {chain_id}: {} members, {} edges",
            graph.len(),
            graph.edges().count()
        );
        Ok(chain_id)
    }

    /// Load a whole graph, members in position order.
    pub fn load_chain(&self, owner_id: UserId, chain_id: ChainId) -> Result<ChainGraph> {
        let chain = self
            .conn
            .query_row(
                "SELECT id, owner_id, name, description, transition_style, is_auto_generated,
                        source_history_start, source_history_end, song_count, play_count,
                        last_played_at
                 FROM mood_chains WHERE id = ?1 AND owner_id = ?2",
                params![chain_id, owner_id],
                chain_from_row,
            )
            .optional()?
            .ok_or(Error::MoodChainNotFound(chain_id))?;

        let mut stmt = self.conn.prepare(
            "SELECT song_id FROM mood_chain_songs WHERE chain_id = ?1 ORDER BY position",
        )?;
        let members = stmt
            .query_map(params![chain_id], |row| row.get::<_, SongId>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT from_song_id, to_song_id, weight, play_count
             FROM mood_chain_transitions WHERE chain_id = ?1",
        )?;
        let edges = stmt
            .query_map(params![chain_id], |row| {
                Ok(TransitionEdge {
                    from_song_id: row.get(0)?,
                    to_song_id: row.get(1)?,
                    weight: row.get(2)?,
                    play_count: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ChainGraph::from_parts(chain, members, edges))
    }

    /// Chain metadata for every chain the owner has, newest first.
    pub fn chains(&self, owner_id: UserId) -> Result<Vec<MoodChain>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, name, description, transition_style, is_auto_generated,
                    source_history_start, source_history_end, song_count, play_count,
                    last_played_at
             FROM mood_chains WHERE owner_id = ?1 ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], chain_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a chain and (via cascade) its members and edges.
    pub fn delete_chain(&self, owner_id: UserId, chain_id: ChainId) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM mood_chains WHERE id = ?1 AND owner_id = ?2",
            params![chain_id, owner_id],
        )?;
        if changed == 0 {
            return Err(Error::MoodChainNotFound(chain_id));
        }
        Ok(())
    }

    // ---- history ---------------------------------------------------

    /// Append a play to the history log and bump the song's play stats.
    ///
    /// The previous song is read from the log itself, so players only
    /// need to report what just played.
    pub fn record_play(
        &mut self,
        user_id: UserId,
        song_id: SongId,
        played_at: DateTime<Utc>,
    ) -> Result<PlayEvent> {
        // Validate ownership before writing anything.
        self.song(user_id, song_id)?;

        let tx = self.conn.transaction()?;
        let previous_song_id: Option<SongId> = tx
            .query_row(
                "SELECT song_id FROM listening_history WHERE user_id = ?1
                 ORDER BY played_at DESC, id DESC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute(
            "INSERT INTO listening_history (user_id, song_id, played_at, previous_song_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, song_id, played_at, previous_song_id],
        )?;
        tx.execute(
            "UPDATE songs SET play_count = play_count + 1, last_played_at = ?1 WHERE id = ?2",
            params![played_at, song_id],
        )?;
        tx.commit()?;
        Ok(PlayEvent {
            user_id,
            song_id,
            played_at,
            previous_song_id,
        })
    }

    /// The user's history in chronological order, optionally only the
    /// most recent `limit` entries.
    pub fn history(&self, user_id: UserId, limit: Option<usize>) -> Result<Vec<PlayEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, song_id, played_at, previous_song_id
             FROM listening_history WHERE user_id = ?1
             ORDER BY played_at DESC, id DESC LIMIT ?2",
        )?;
        let cap = limit.map_or(-1, |n| n as i64);
        let mut events = stmt
            .query_map(params![user_id, cap], |row| {
                Ok(PlayEvent {
                    user_id: row.get(0)?,
                    song_id: row.get(1)?,
                    played_at: row.get(2)?,
                    previous_song_id: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        // Queried newest-first so LIMIT keeps the recent slice; callers
        // get it oldest-first.
        events.reverse();
        Ok(events)
    }

    // ---- orchestration ---------------------------------------------

    /// Create an empty manually curated chain.
    pub fn create_chain(
        &mut self,
        owner_id: UserId,
        name: &str,
        description: Option<&str>,
        style: TransitionStyle,
    ) -> Result<ChainGraph> {
        let mut chain = MoodChain::new(owner_id, name, style);
        chain.description = description.map(str::to_string);
        let mut graph = ChainGraph::new(chain);
        self.save_chain(&mut graph)?;
        Ok(graph)
    }

    /// Load a chain, rank follow-ups to `current_song_id`, and return
    /// the ranked list. Validates that both the chain and the song exist
    /// and belong to the owner.
    pub fn suggest_for_chain<R: Rng + ?Sized>(
        &self,
        owner_id: UserId,
        chain_id: ChainId,
        current_song_id: SongId,
        exclude_recent: usize,
        rng: &mut R,
    ) -> Result<Vec<Suggestion>> {
        let graph = self.load_chain(owner_id, chain_id)?;
        let current = self.song(owner_id, current_song_id)?;
        let songs = self.songs_by_ids(owner_id, graph.members())?;
        Ok(suggest::suggest_next(&graph, &songs, &current, exclude_recent, rng))
    }

    /// Record an actually-played transition and persist the reinforced
    /// graph.
    pub fn record_traversal(
        &mut self,
        owner_id: UserId,
        chain_id: ChainId,
        from: SongId,
        to: SongId,
        at: DateTime<Utc>,
    ) -> Result<TransitionEdge> {
        let mut graph = self.load_chain(owner_id, chain_id)?;
        let edge = *graph.record_traversal(from, to, at)?;
        self.save_chain(&mut graph)?;
        Ok(edge)
    }

    /// Mine the user's history into a new chain and persist it.
    pub fn synthesize_chain(
        &mut self,
        owner_id: UserId,
        name: &str,
        min_plays: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ChainGraph> {
        let events = self.history(owner_id, None)?;
        let mut graph = synth::synthesize(owner_id, name, &events, min_plays, from, to);
        self.save_chain(&mut graph)?;
        Ok(graph)
    }
}

const SONG_COLUMNS: &str = "id, owner_id, title, artist, album, genre, bpm, energy, valence,
                            duration_seconds, play_count, last_played_at";

fn song_from_row(row: &Row) -> rusqlite::Result<SongProfile> {
    Ok(SongProfile {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        album: row.get(4)?,
        genre: row.get(5)?,
        bpm: row.get(6)?,
        energy: row.get(7)?,
        valence: row.get(8)?,
        duration_seconds: row.get(9)?,
        play_count: row.get(10)?,
        last_played_at: row.get(11)?,
    })
}

fn chain_from_row(row: &Row) -> rusqlite::Result<MoodChain> {
    let style: String = row.get(4)?;
    Ok(MoodChain {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        transition_style: TransitionStyle::from_str_lossy(&style),
        is_auto_generated: row.get(5)?,
        source_history_start: row.get(6)?,
        source_history_end: row.get(7)?,
        song_count: row.get(8)?,
        play_count: row.get(9)?,
        last_played_at: row.get(10)?,
    })
}
