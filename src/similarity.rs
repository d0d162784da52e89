//! Content-based similarity scoring between two songs.
//!
//! The scorer is a pure function: it reads two feature records and
//! produces a bounded score plus qualitative reason tags. Every
//! recommendation feature in this crate goes through it.
//!
//! ## How the blend works
//!
//! Each factor (genre, BPM, energy, valence, artist) is independently
//! gated: it only participates when both songs carry the attribute.
//! A participating factor adds its weight to a running weight-sum and
//! some fraction of that weight to a running score; the final score is
//! `score / weight_sum`. Two songs that share *no* comparable attribute
//! get a flat 0.3, moderately dissimilar, not zero, because we know
//! nothing about them. The artist factor is special: it always counts in
//! the weight-sum, so a mismatched artist pulls the score down even when
//! nothing else is comparable.

use crate::model::SongProfile;

/// Per-factor weights for the blend. The defaults sum to 1.0 so a song
/// matching every factor at the tightest tier scores exactly 1.0.
#[derive(Debug, Clone, Copy)]
pub struct FactorWeights {
    pub genre: f64,
    pub bpm: f64,
    pub energy: f64,
    pub valence: f64,
    pub artist: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            genre: 0.30,
            bpm: 0.20,
            energy: 0.20,
            valence: 0.15,
            artist: 0.15,
        }
    }
}

/// Score assumed when no factor is comparable at all.
const NO_SIGNAL_FALLBACK: f64 = 0.3;

/// A bounded similarity score with the tags that earned it.
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    /// Blended score in [0.0, 1.0].
    pub score: f64,
    /// Reason tags in factor-evaluation order; may be empty even for a
    /// positive score (loose tiers contribute without a tag).
    pub reasons: Vec<&'static str>,
}

/// Score `candidate` against `source` with the default weights.
#[must_use]
pub fn similarity(source: &SongProfile, candidate: &SongProfile) -> Similarity {
    similarity_weighted(source, candidate, &FactorWeights::default())
}

/// Score `candidate` against `source` with explicit weights.
///
/// No factor is asymmetric, so swapping the arguments yields the same
/// score; the tests pin that property.
#[must_use]
pub fn similarity_weighted(
    source: &SongProfile,
    candidate: &SongProfile,
    weights: &FactorWeights,
) -> Similarity {
    let mut score = 0.0;
    let mut weight_sum = 0.0;
    let mut reasons = Vec::new();

    // Genre: case-insensitive exact match, all or nothing.
    if let (Some(a), Some(b)) = (nonempty(&source.genre), nonempty(&candidate.genre)) {
        weight_sum += weights.genre;
        if a.eq_ignore_ascii_case(b) {
            score += weights.genre;
            reasons.push("same genre");
        }
    }

    // BPM: tiered by absolute difference.
    if let (Some(a), Some(b)) = (source.bpm, candidate.bpm) {
        weight_sum += weights.bpm;
        let diff = (a - b).abs();
        if diff <= 10 {
            score += weights.bpm;
            reasons.push("similar BPM");
        } else if diff <= 20 {
            score += weights.bpm * 0.75;
            reasons.push("close BPM");
        } else if diff <= 30 {
            score += weights.bpm * 0.5;
        }
    }

    // Energy: same tier shape on a [0,1] attribute.
    if let (Some(a), Some(b)) = (source.energy, candidate.energy) {
        weight_sum += weights.energy;
        let diff = (a - b).abs();
        if diff <= 0.1 {
            score += weights.energy;
            reasons.push("similar energy");
        } else if diff <= 0.2 {
            score += weights.energy * 0.75;
        } else if diff <= 0.3 {
            score += weights.energy * 0.5;
        }
    }

    // Valence, tiered like energy.
    if let (Some(a), Some(b)) = (source.valence, candidate.valence) {
        weight_sum += weights.valence;
        let diff = (a - b).abs();
        if diff <= 0.1 {
            score += weights.valence;
            reasons.push("similar mood");
        } else if diff <= 0.2 {
            score += weights.valence * 0.75;
        } else if diff <= 0.3 {
            score += weights.valence * 0.5;
        }
    }

    // Artist: always participates in the weight-sum, even when one side
    // has no artist. Only an actual match adds score.
    weight_sum += weights.artist;
    if let (Some(a), Some(b)) = (nonempty(&source.artist), nonempty(&candidate.artist)) {
        if a.eq_ignore_ascii_case(b) {
            score += weights.artist;
            reasons.push("same artist");
        }
    }

    let score = if weight_sum > 0.0 {
        score / weight_sum
    } else {
        NO_SIGNAL_FALLBACK
    };

    let result = Similarity {
        score: score.clamp(0.0, 1.0),
        reasons,
    };
    log::trace!(
        "similarity {} -> {}: {:.3} {:?}",
        source.id,
        candidate.id,
        result.score,
        result.reasons
    );
    result
}

fn nonempty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(
        id: i64,
        genre: Option<&str>,
        bpm: Option<i64>,
        energy: Option<f64>,
        valence: Option<f64>,
        artist: Option<&str>,
    ) -> SongProfile {
        SongProfile {
            id,
            owner_id: 1,
            title: format!("song {id}"),
            artist: artist.map(str::to_string),
            album: None,
            genre: genre.map(str::to_string),
            bpm,
            energy,
            valence,
            duration_seconds: 180,
            play_count: 0,
            last_played_at: None,
        }
    }

    #[test]
    fn perfect_match_scores_one() {
        let a = song(1, Some("Rock"), Some(120), Some(0.7), Some(0.6), Some("X"));
        let b = song(2, Some("Rock"), Some(122), Some(0.72), Some(0.58), Some("X"));
        let sim = similarity(&a, &b);
        assert!((sim.score - 1.0).abs() < 1e-9, "score was {}", sim.score);
        for tag in [
            "same genre",
            "similar BPM",
            "similar energy",
            "similar mood",
            "same artist",
        ] {
            assert!(sim.reasons.contains(&tag), "missing reason {tag}");
        }
    }

    #[test]
    fn genre_match_is_case_insensitive() {
        let a = song(1, Some("rock"), None, None, None, None);
        let b = song(2, Some("ROCK"), None, None, None, None);
        let sim = similarity(&a, &b);
        assert!(sim.reasons.contains(&"same genre"));
        // genre weight over genre+artist weight-sum
        assert!((sim.score - 0.30 / 0.45).abs() < 1e-9);
    }

    #[test]
    fn bpm_tiers() {
        let base = song(1, None, Some(100), None, None, None);
        let w = FactorWeights::default();
        // Only bpm (0.2) + artist (0.15) participate.
        let sum = w.bpm + w.artist;

        let tight = similarity(&base, &song(2, None, Some(108), None, None, None));
        assert!((tight.score - w.bpm / sum).abs() < 1e-9);
        assert_eq!(tight.reasons, vec!["similar BPM"]);

        let close = similarity(&base, &song(2, None, Some(115), None, None, None));
        assert!((close.score - w.bpm * 0.75 / sum).abs() < 1e-9);
        assert_eq!(close.reasons, vec!["close BPM"]);

        let loose = similarity(&base, &song(2, None, Some(128), None, None, None));
        assert!((loose.score - w.bpm * 0.5 / sum).abs() < 1e-9);
        assert!(loose.reasons.is_empty());

        let far = similarity(&base, &song(2, None, Some(140), None, None, None));
        assert!((far.score - 0.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_artist_scores_zero_not_fallback() {
        // No comparable attributes except the always-counted artist
        // factor: weight-sum is 0.15, score 0 -> exactly 0.0.
        let a = song(1, None, None, None, None, Some("A"));
        let b = song(2, None, None, None, None, Some("B"));
        let sim = similarity(&a, &b);
        assert_eq!(sim.score, 0.0);
        assert!(sim.reasons.is_empty());
    }

    #[test]
    fn artist_factor_counts_even_when_absent() {
        // Artist missing on both sides still contributes to the
        // weight-sum, so the score is 0.0, not the fallback.
        let a = song(1, None, None, None, None, None);
        let b = song(2, None, None, None, None, None);
        let sim = similarity(&a, &b);
        assert_eq!(sim.score, 0.0);
    }

    #[test]
    fn fallback_requires_zero_weight_sum() {
        // The artist factor makes a zero weight-sum unreachable with the
        // default weights; verify the fallback with an all-zero config.
        let zero = FactorWeights {
            genre: 0.0,
            bpm: 0.0,
            energy: 0.0,
            valence: 0.0,
            artist: 0.0,
        };
        let a = song(1, None, None, None, None, None);
        let b = song(2, None, None, None, None, None);
        let sim = similarity_weighted(&a, &b, &zero);
        assert_eq!(sim.score, NO_SIGNAL_FALLBACK);
    }

    #[test]
    fn symmetry_over_sample_grid() {
        // No factor is asymmetric, so similarity must commute.
        let songs = [
            song(1, Some("Rock"), Some(120), Some(0.7), Some(0.6), Some("X")),
            song(2, Some("rock"), Some(135), Some(0.5), Some(0.2), Some("Y")),
            song(3, None, Some(90), None, Some(0.9), Some("X")),
            song(4, Some("Jazz"), None, Some(0.1), None, None),
            song(5, None, None, None, None, None),
        ];
        for a in &songs {
            for b in &songs {
                let ab = similarity(a, b);
                let ba = similarity(b, a);
                assert!(
                    (ab.score - ba.score).abs() < 1e-12,
                    "asymmetric for {} vs {}: {} != {}",
                    a.id,
                    b.id,
                    ab.score,
                    ba.score
                );
            }
        }
    }

    #[test]
    fn empty_genre_does_not_participate() {
        let a = song(1, Some(""), None, None, None, None);
        let b = song(2, Some(""), None, None, None, None);
        let sim = similarity(&a, &b);
        // Only the artist factor participates; empty strings are treated
        // as missing metadata, not as equal genres.
        assert_eq!(sim.score, 0.0);
        assert!(sim.reasons.is_empty());
    }
}
