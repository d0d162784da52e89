//! Performance benchmarks for the hot paths: similarity scoring,
//! suggestion ranking over a loaded chain, and history synthesis.
//!
//! ```bash
//! cargo bench
//! cargo bench similarity
//! cargo bench suggest
//! ```

use std::collections::HashMap;
use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use segue::cache::NoopCache;
use segue::chain::ChainGraph;
use segue::model::{MoodChain, PlayEvent, SongId, SongProfile, TransitionStyle};
use segue::recommend::Recommender;
use segue::similarity::similarity;
use segue::suggest::suggest_next;
use segue::synth::synthesize;

fn make_song(id: SongId) -> SongProfile {
    SongProfile {
        id,
        owner_id: 1,
        title: format!("track {id}"),
        artist: Some(format!("artist {}", id % 40)),
        album: None,
        genre: Some(["Rock", "Jazz", "Electronic", "Folk"][(id % 4) as usize].to_string()),
        bpm: Some(80 + (id % 90)),
        energy: Some((id % 100) as f64 / 100.0),
        valence: Some(((id * 7) % 100) as f64 / 100.0),
        duration_seconds: 180 + (id % 120),
        play_count: id % 30,
        last_played_at: None,
    }
}

fn make_library(size: i64) -> Vec<SongProfile> {
    (1..=size).map(make_song).collect()
}

fn bench_similarity(c: &mut Criterion) {
    let a = make_song(1);
    let b = make_song(2);
    c.bench_function("similarity/pair", |bencher| {
        bencher.iter(|| similarity(black_box(&a), black_box(&b)));
    });

    let mut group = c.benchmark_group("similarity/library_scan");
    for size in [100i64, 1_000, 5_000] {
        let library = make_library(size);
        let source = make_song(0);
        let cache = NoopCache;
        let recommender = Recommender::new(&cache);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| recommender.similar_songs(1, black_box(&source), &library, 20));
        });
    }
    group.finish();
}

fn bench_suggest(c: &mut Criterion) {
    let mut group = c.benchmark_group("suggest/ranking");
    for size in [50usize, 500] {
        let mut chain = MoodChain::new(1, "bench", TransitionStyle::Smooth);
        chain.id = 1;
        let mut graph = ChainGraph::new(chain);
        let mut songs: HashMap<SongId, SongProfile> = HashMap::new();
        for id in 1..=size as SongId {
            graph.add_member(id, None).unwrap();
            songs.insert(id, make_song(id));
        }
        // A handful of learned edges, like a chain that has seen play.
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for id in 2..=(size as SongId).min(10) {
            graph.record_traversal(1, id, t0).unwrap();
        }
        let current = songs[&1].clone();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            let mut rng = StdRng::seed_from_u64(0);
            bencher.iter(|| suggest_next(black_box(&graph), &songs, &current, 0, &mut rng));
        });
    }
    group.finish();
}

fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("synth/history");
    for entries in [1_000usize, 10_000] {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events: Vec<PlayEvent> = (0..entries)
            .map(|i| PlayEvent {
                user_id: 1,
                song_id: (i % 120) as SongId + 1,
                played_at: start + Duration::minutes(i as i64 * 3),
                previous_song_id: None,
            })
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(entries),
            &entries,
            |bencher, _| {
                bencher.iter(|| synthesize(1, "bench", black_box(&events), 3, None, None));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_similarity, bench_suggest, bench_synthesize);
criterion_main!(benches);
