use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use ragdb_core::error::{Error, Result};
use ragdb_core::types::{Chunk, Embedding, Metric};
use ragdb_text::{Bm25Params, KeywordIndex, KeywordStats};
use ragdb_vector::VectorIndex;

/// An immutable, fully built index generation: chunks plus both indexes.
#[derive(Debug)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
    vector: VectorIndex,
    keyword: KeywordIndex,
    encoder_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub sources: usize,
    pub vocabulary: usize,
    pub dim: usize,
    pub metric: Metric,
    pub encoder_id: String,
}

pub struct CorpusParts {
    pub metric: Metric,
    pub dim: usize,
    pub encoder_id: String,
}

impl Corpus {
    pub fn build(parts: CorpusParts, chunks: Vec<Chunk>, embeddings: Vec<Embedding>, bm25: Bm25Params) -> Result<Self> {
        let keyword = KeywordIndex::build(&chunks, bm25);
        Self::assemble(parts, chunks, embeddings, keyword)
    }

    pub fn from_parts(parts: CorpusParts, chunks: Vec<Chunk>, embeddings: Vec<Embedding>, stats: KeywordStats) -> Result<Self> {
        let keyword = KeywordIndex::from_stats(&chunks, stats)?;
        Self::assemble(parts, chunks, embeddings, keyword)
    }

    fn assemble(parts: CorpusParts, chunks: Vec<Chunk>, embeddings: Vec<Embedding>, keyword: KeywordIndex) -> Result<Self> {
        let vector = VectorIndex::build(parts.metric, parts.dim, &chunks, embeddings)?;
        let mut positions = HashMap::with_capacity(chunks.len());
        for (i, c) in chunks.iter().enumerate() {
            if positions.insert(c.id.clone(), i).is_some() {
                return Err(Error::invalid("chunks", format!("duplicate chunk id `{}`", c.id)));
            }
        }
        Ok(Self { chunks, positions, vector, keyword, encoder_id: parts.encoder_id })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: &str) -> Option<&Chunk> {
        self.positions.get(id).map(|&i| &self.chunks[i])
    }

    pub fn vector(&self) -> &VectorIndex {
        &self.vector
    }

    pub fn keyword(&self) -> &KeywordIndex {
        &self.keyword
    }

    pub fn encoder_id(&self) -> &str {
        &self.encoder_id
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let sources: BTreeSet<&str> = self.chunks.iter().map(|c| c.source_id.as_str()).collect();
        IndexStats {
            chunks: self.chunks.len(),
            sources: sources.len(),
            vocabulary: self.keyword.vocabulary_size(),
            dim: self.vector.dim(),
            metric: self.vector.metric(),
            encoder_id: self.encoder_id.clone(),
        }
    }
}
