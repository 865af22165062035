//! Combining the vector and keyword candidate lists into one ranking.
use std::collections::BTreeMap;

use ragdb_core::config::{FusionKind, SearchConfig};
use ragdb_core::error::{Error, Result};
use ragdb_core::types::{rank_order, ChunkId, SearchHit};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub keyword: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { vector: 0.5, keyword: 0.5 }
    }
}

impl FusionWeights {
    pub fn new(vector: f32, keyword: f32) -> Result<Self> {
        let w = Self { vector, keyword };
        w.validate()?;
        Ok(w)
    }

    pub fn validate(&self) -> Result<()> {
        for (param, w) in [("weights.vector", self.vector), ("weights.keyword", self.keyword)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::invalid(param, format!("{w} is not a finite non-negative weight")));
            }
        }
        if self.vector + self.keyword <= 0.0 {
            return Err(Error::invalid("weights", "at least one weight must be positive"));
        }
        Ok(())
    }
}

impl From<&SearchConfig> for FusionWeights {
    fn from(cfg: &SearchConfig) -> Self {
        Self { vector: cfg.vector_weight, keyword: cfg.keyword_weight }
    }
}

/// A fused candidate; raw scores are `None` when the chunk was missing from
/// that list.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: ChunkId,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub keyword_score: Option<f32>,
}

pub trait FusionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fused hits sorted by descending score, ties by ascending id.
    fn fuse(&self, vector: &[SearchHit], keyword: &[SearchHit], weights: FusionWeights) -> Vec<FusedHit>;
}

/// `w_v * v / max(v) + w_k * k / max(k)`, with negative scores clamped to 0
/// and a list whose max is not positive contributing nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSum;

/// `Σ w / (k + rank)` with 1-based ranks.
#[derive(Debug, Clone, Copy)]
pub struct ReciprocalRank {
    pub k: f32,
}

impl Default for ReciprocalRank {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

pub fn strategy_from_config(cfg: &SearchConfig) -> Box<dyn FusionStrategy> {
    match cfg.fusion {
        FusionKind::Weighted => Box::new(WeightedSum),
        FusionKind::Rrf => Box::new(ReciprocalRank { k: cfg.rrf_k }),
    }
}

fn merge(
    vector: &[SearchHit],
    keyword: &[SearchHit],
    vector_part: impl Fn(usize, f32) -> f32,
    keyword_part: impl Fn(usize, f32) -> f32,
) -> Vec<FusedHit> {
    let mut by_id: BTreeMap<&str, FusedHit> = BTreeMap::new();
    for (rank, h) in vector.iter().enumerate() {
        let e = by_id.entry(&h.id).or_insert_with(|| empty(&h.id));
        e.vector_score = Some(h.score);
        e.score += vector_part(rank, h.score);
    }
    for (rank, h) in keyword.iter().enumerate() {
        let e = by_id.entry(&h.id).or_insert_with(|| empty(&h.id));
        e.keyword_score = Some(h.score);
        e.score += keyword_part(rank, h.score);
    }
    let mut fused: Vec<FusedHit> = by_id.into_values().collect();
    fused.sort_by(|a, b| rank_order(a.score, &a.id, b.score, &b.id));
    fused
}

fn empty(id: &str) -> FusedHit {
    FusedHit { id: id.to_string(), score: 0.0, vector_score: None, keyword_score: None }
}

fn max_score(hits: &[SearchHit]) -> f32 {
    hits.iter().map(|h| h.score).fold(f32::NEG_INFINITY, f32::max)
}

fn normalized(score: f32, max: f32) -> f32 {
    if max > 0.0 {
        score.max(0.0) / max
    } else {
        0.0
    }
}

impl FusionStrategy for WeightedSum {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn fuse(&self, vector: &[SearchHit], keyword: &[SearchHit], weights: FusionWeights) -> Vec<FusedHit> {
        let (vmax, kmax) = (max_score(vector), max_score(keyword));
        merge(
            vector,
            keyword,
            |_, s| weights.vector * normalized(s, vmax),
            |_, s| weights.keyword * normalized(s, kmax),
        )
    }
}

impl FusionStrategy for ReciprocalRank {
    fn name(&self) -> &'static str {
        "rrf"
    }

    fn fuse(&self, vector: &[SearchHit], keyword: &[SearchHit], weights: FusionWeights) -> Vec<FusedHit> {
        let k = self.k;
        merge(
            vector,
            keyword,
            |rank, _| weights.vector / (k + (rank + 1) as f32),
            |rank, _| weights.keyword / (k + (rank + 1) as f32),
        )
    }
}
