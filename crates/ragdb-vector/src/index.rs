use tracing::debug;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::{rank_hits, Chunk, ChunkId, Embedding, Metric, SearchHit, SourceKind};

use crate::metric::{l2_norm, similarity};

/// Flat index: one embedding per chunk, scanned exhaustively per query.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metric: Metric,
    dim: usize,
    ids: Vec<ChunkId>,
    vectors: Vec<Embedding>,
    norms: Vec<f32>,
}

impl VectorIndex {
    pub fn build(metric: Metric, dim: usize, chunks: &[Chunk], embeddings: Vec<Embedding>) -> Result<Self> {
        if dim == 0 {
            return Err(Error::invalid("dim", "must be greater than zero"));
        }
        if chunks.len() != embeddings.len() {
            return Err(Error::invalid(
                "embeddings",
                format!("{} embeddings for {} chunks", embeddings.len(), chunks.len()),
            ));
        }
        if let Some((i, v)) = embeddings.iter().enumerate().find(|(_, v)| v.len() != dim) {
            return Err(Error::invalid(
                "embeddings",
                format!("embedding for `{}` has {} components, expected {dim}", chunks[i].id, v.len()),
            ));
        }
        let norms = embeddings.iter().map(|v| l2_norm(v)).collect();
        let ids = chunks.iter().map(|c| c.id.clone()).collect();
        Ok(Self { metric, dim, ids, vectors: embeddings, norms })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Embeddings in chunk order.
    pub fn embeddings(&self) -> &[Embedding] {
        &self.vectors
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::invalid("k", "must be greater than zero"));
        }
        if query.len() != self.dim {
            return Err(Error::invalid(
                "query",
                format!("query has {} components, index expects {}", query.len(), self.dim),
            ));
        }
        let qn = l2_norm(query);
        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .zip(&self.norms)
            .zip(&self.ids)
            .map(|((v, n), id)| SearchHit {
                id: id.clone(),
                score: similarity(self.metric, query, qn, v, *n),
                source: SourceKind::Vector,
            })
            .collect();
        rank_hits(&mut hits, k);
        debug!(scanned = self.vectors.len(), hits = hits.len(), "vector search");
        Ok(hits)
    }
}
