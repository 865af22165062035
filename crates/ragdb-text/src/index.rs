//! In-memory Okapi BM25 over chunk text.
//!
//! Scoring follows tantivy's `Bm25Weight` (same idf, same tf saturation) but
//! with `k1`/`b` taken from configuration and exact, unquantized document
//! lengths. The index keeps only term statistics ([`KeywordStats`]), which
//! are serialized into the snapshot so a reload scores exactly like the build.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::{rank_hits, Chunk, ChunkId, SearchHit, SourceKind};

use crate::analyzer::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Term statistics; `postings` maps a term to `(chunk ordinal, tf)` pairs in
/// ascending ordinal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordStats {
    pub k1: f32,
    pub b: f32,
    pub doc_lengths: Vec<u32>,
    pub postings: BTreeMap<String, Vec<(u32, u32)>>,
}

#[derive(Debug, Clone)]
pub struct KeywordIndex {
    ids: Vec<ChunkId>,
    stats: KeywordStats,
    avgdl: f32,
    analyzer: Analyzer,
}

impl KeywordIndex {
    pub fn build(chunks: &[Chunk], params: Bm25Params) -> Self {
        let analyzer = Analyzer::english();
        let mut doc_lengths = Vec::with_capacity(chunks.len());
        let mut postings: BTreeMap<String, Vec<(u32, u32)>> = BTreeMap::new();
        for (ord, chunk) in chunks.iter().enumerate() {
            let tokens = analyzer.tokens(&chunk.text);
            doc_lengths.push(tokens.len() as u32);
            let mut tf: BTreeMap<String, u32> = BTreeMap::new();
            for t in tokens {
                *tf.entry(t).or_insert(0) += 1;
            }
            for (term, count) in tf {
                postings.entry(term).or_default().push((ord as u32, count));
            }
        }
        let stats = KeywordStats { k1: params.k1, b: params.b, doc_lengths, postings };
        debug!(chunks = chunks.len(), terms = stats.postings.len(), "keyword index built");
        Self::assemble(chunks, stats, analyzer)
    }

    /// Rebuild from stored statistics, checking they describe `chunks`.
    pub fn from_stats(chunks: &[Chunk], stats: KeywordStats) -> Result<Self> {
        if stats.doc_lengths.len() != chunks.len() {
            return Err(Error::invalid(
                "keyword.doc_lengths",
                format!("{} lengths for {} chunks", stats.doc_lengths.len(), chunks.len()),
            ));
        }
        if !stats.k1.is_finite() || stats.k1 < 0.0 || !(0.0..=1.0).contains(&stats.b) {
            return Err(Error::invalid("keyword.params", format!("k1={} b={}", stats.k1, stats.b)));
        }
        let mut counted = vec![0u64; chunks.len()];
        for (term, list) in &stats.postings {
            let mut prev: Option<u32> = None;
            for &(ord, tf) in list {
                let slot = counted.get_mut(ord as usize).ok_or_else(|| {
                    Error::invalid("keyword.postings", format!("term `{term}` points at missing chunk {ord}"))
                })?;
                if tf == 0 || prev.is_some_and(|p| p >= ord) {
                    return Err(Error::invalid("keyword.postings", format!("term `{term}` has a malformed posting list")));
                }
                *slot += u64::from(tf);
                prev = Some(ord);
            }
        }
        if let Some(ord) = counted.iter().zip(&stats.doc_lengths).position(|(c, l)| *c != u64::from(*l)) {
            return Err(Error::invalid("keyword.doc_lengths", format!("chunk {ord} length does not match its postings")));
        }
        Ok(Self::assemble(chunks, stats, Analyzer::english()))
    }

    fn assemble(chunks: &[Chunk], stats: KeywordStats, analyzer: Analyzer) -> Self {
        let total: u64 = stats.doc_lengths.iter().map(|l| u64::from(*l)).sum();
        let avgdl = if stats.doc_lengths.is_empty() { 0.0 } else { total as f32 / stats.doc_lengths.len() as f32 };
        let ids = chunks.iter().map(|c| c.id.clone()).collect();
        Self { ids, stats, avgdl, analyzer }
    }

    pub fn stats(&self) -> &KeywordStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.stats.postings.len()
    }

    /// Top `k` chunks by BM25; chunks sharing no term with the query are left out.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::invalid("k", "must be greater than zero"));
        }
        let terms: BTreeSet<String> = self.analyzer.tokens(query).into_iter().collect();
        let n = self.ids.len() as f32;
        let KeywordStats { k1, b, .. } = self.stats;
        let avgdl = self.avgdl.max(f32::MIN_POSITIVE);

        let mut scores: HashMap<u32, f32> = HashMap::new();
        for term in &terms {
            let Some(list) = self.stats.postings.get(term) else { continue };
            let df = list.len() as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for &(ord, tf) in list {
                let tf = tf as f32;
                let dl = self.stats.doc_lengths[ord as usize] as f32;
                let norm = tf + k1 * (1.0 - b + b * dl / avgdl);
                *scores.entry(ord).or_insert(0.0) += idf * tf * (k1 + 1.0) / norm;
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(ord, score)| SearchHit { id: self.ids[ord as usize].clone(), score, source: SourceKind::Keyword })
            .collect();
        rank_hits(&mut hits, k);
        debug!(terms = terms.len(), hits = hits.len(), "keyword search");
        Ok(hits)
    }
}
