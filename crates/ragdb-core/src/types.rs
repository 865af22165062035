//! Domain types shared by the chunker, both indexes and the hybrid engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;
pub type Embedding = Vec<f32>;

/// Raw text handed over by content acquisition, plus opaque provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
    pub metadata: Meta,
}

impl SourceDocument {
    /// Source whose id is derived from its content (`doc_<16 hex>`).
    pub fn new(text: impl Into<String>, metadata: Meta) -> Self {
        let text = text.into();
        let id = content_source_id(&text);
        Self { id, text, metadata }
    }

    pub fn with_id(id: impl Into<String>, text: impl Into<String>, metadata: Meta) -> Self {
        Self { id: id.into(), text: text.into(), metadata }
    }
}

pub fn content_source_id(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes());
    format!("doc_{}", &hash.to_hex()[..16])
}

/// A chunk of a source document that is independently indexed.
///
/// - `id`: `"{source_id}:{index:05}"`, stable across re-indexing
/// - `index`: ordinal of the chunk within its source
/// - `start`: byte offset of `text` inside the source text
/// - `metadata`: the source's metadata, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source_id: String,
    pub index: usize,
    pub start: usize,
    pub text: String,
    pub metadata: Meta,
}

pub fn chunk_id(source_id: &str, index: usize) -> ChunkId {
    format!("{source_id}:{index:05}")
}

/// Similarity used by the vector index; fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Dot,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
        })
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Keyword,
}

/// The minimal surface returned by both single-signal indexes.
///
/// `id` matches `Chunk::id`. `score` is engine-specific but higher is
/// always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// Descending by score, ties broken by ascending chunk id.
pub fn rank_order(a_score: f32, a_id: &str, b_score: f32, b_id: &str) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_id.cmp(b_id))
}

/// Sort hits into result order and keep the first `k`.
pub fn rank_hits(hits: &mut Vec<SearchHit>, k: usize) {
    hits.sort_by(|a, b| rank_order(a.score, &a.id, b.score, &b.id));
    hits.truncate(k);
}

/// A chunk returned by hybrid retrieval.
///
/// `score` is the fused score; the per-signal raw scores are `None` when the
/// chunk did not appear in that candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub keyword_score: Option<f32>,
}

/// Ranked passages supporting one question; what the answer generator gets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub question: String,
    pub passages: Vec<RankedChunk>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Numbered passages with provenance, in rank order.
    pub fn context(&self) -> String {
        let mut out = String::new();
        for (i, p) in self.passages.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "[{}] {} (score {:.3})", i + 1, p.chunk.source_id, p.score);
            out.push_str(&p.chunk.text);
            out.push('\n');
        }
        out
    }
}
