//! Question in, evidence out.
use std::sync::Arc;
use tracing::debug;

use ragdb_core::config::SearchConfig;
use ragdb_core::error::Result;
use ragdb_core::types::{Evidence, RankedChunk};

use crate::fusion::FusionWeights;
use crate::manager::IndexManager;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Passages whose fused score falls below this are dropped.
    pub min_score: f32,
    pub weights: FusionWeights,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { min_score: 0.0, weights: FusionWeights::default() }
    }
}

impl From<&SearchConfig> for PipelineOptions {
    fn from(cfg: &SearchConfig) -> Self {
        Self { min_score: cfg.min_score, weights: FusionWeights::from(cfg) }
    }
}

pub struct RagPipeline {
    index: Arc<IndexManager>,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(index: Arc<IndexManager>, options: PipelineOptions) -> Self {
        Self { index, options }
    }

    pub fn index(&self) -> &Arc<IndexManager> {
        &self.index
    }

    pub async fn answer_query(&self, question: &str, k: usize) -> Result<Evidence> {
        let passages = self.index.hybrid_search(question, k, self.options.weights).await?;
        Ok(self.evidence(question, passages))
    }

    /// BM25-only evidence, for when the encoder is unavailable or unwanted.
    pub async fn answer_query_keyword(&self, question: &str, k: usize) -> Result<Evidence> {
        let passages = self.index.keyword_search(question, k).await?;
        Ok(self.evidence(question, passages))
    }

    fn evidence(&self, question: &str, passages: Vec<RankedChunk>) -> Evidence {
        let total = passages.len();
        let passages: Vec<RankedChunk> = passages.into_iter().filter(|p| p.score >= self.options.min_score).collect();
        debug!(kept = passages.len(), dropped = total - passages.len(), "evidence assembled");
        Evidence { question: question.to_string(), passages }
    }
}
