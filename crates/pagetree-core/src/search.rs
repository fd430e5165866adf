//! Score normalization and hybrid merging for similarity queries.
//!
//! Sinks produce raw per-chunk scores from up to two retrieval arms
//! (keyword and vector). This module turns them into one ranked list:
//!
//! 1. Normalize each arm to `[0, 1]` using min-max normalization.
//! 2. Merge: `score = (1 - α) × keyword + α × vector`. A chunk missing
//!    from an arm scores `0.0` there.
//! 3. Sort by score (desc), then chunk id (asc).

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A chunk matched by one retrieval arm, with its raw backend score
/// (BM25-derived relevance or cosine similarity). Higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub chunk_id: String,
    pub raw_score: f64,
}

impl ChunkCandidate {
    pub fn new(chunk_id: impl Into<String>, raw_score: f64) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            raw_score,
        }
    }
}

/// A merged, scored chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: String,
    /// Hybrid score in `[0.0, 1.0]`.
    pub score: f64,
    pub keyword_score: f64,
    pub vector_score: f64,
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(candidates: &[ChunkCandidate]) -> Vec<(&ChunkCandidate, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (c, norm)
        })
        .collect()
}

/// Merge keyword and vector candidates into one ranked list.
///
/// `alpha` is clamped to `[0, 1]`. With `alpha == 0.0` the ranking equals
/// the normalized keyword ranking.
pub fn hybrid_merge(
    keyword: &[ChunkCandidate],
    vector: &[ChunkCandidate],
    alpha: f64,
) -> Vec<ScoredChunk> {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut merged: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

    for (c, s) in normalize_scores(keyword) {
        let entry = merged.entry(c.chunk_id.as_str()).or_insert((0.0, 0.0));
        entry.0 = entry.0.max(s);
    }
    for (c, s) in normalize_scores(vector) {
        let entry = merged.entry(c.chunk_id.as_str()).or_insert((0.0, 0.0));
        entry.1 = entry.1.max(s);
    }

    let mut scored: Vec<ScoredChunk> = merged
        .into_iter()
        .map(|(id, (k, v))| ScoredChunk {
            chunk_id: id.to_string(),
            score: (1.0 - alpha) * k + alpha * v,
            keyword_score: k,
            vector_score: v,
        })
        .collect();

    sort_scored(&mut scored);
    scored
}

/// Sort by score (desc), then chunk id (asc).
pub fn sort_scored(scored: &mut [ScoredChunk]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}
