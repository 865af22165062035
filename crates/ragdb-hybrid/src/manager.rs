//! Owns the live corpus: builds it, publishes it, persists it, searches it.
//!
//! Readers clone the published `Arc<Corpus>` under a short read lock and
//! search without holding any lock. A build assembles a new corpus on the
//! side and swaps it in with a single write, so a failed build changes
//! nothing. One build runs at a time; a second one is refused.
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use ragdb_core::chunker::Chunker;
use ragdb_core::config::EngineConfig;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Encoder;
use ragdb_core::types::{Chunk, RankedChunk, SearchHit, SourceDocument, SourceKind};
use ragdb_embed::{EmbeddingManager, EmbeddingOptions};
use ragdb_text::Bm25Params;

use crate::corpus::{Corpus, CorpusParts, IndexStats};
use crate::fusion::{strategy_from_config, FusionStrategy, FusionWeights};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub sources: usize,
    pub duplicates_skipped: usize,
    pub chunks: usize,
    pub elapsed: Duration,
}

pub struct IndexManager {
    config: EngineConfig,
    chunker: Chunker,
    embeddings: EmbeddingManager,
    fusion: Box<dyn FusionStrategy>,
    live: RwLock<Option<Arc<Corpus>>>,
    build_gate: tokio::sync::Mutex<()>,
    persist_lock: Mutex<()>,
}

impl IndexManager {
    pub fn new(config: EngineConfig, encoder: Arc<dyn Encoder>) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunking)?;
        let embeddings = EmbeddingManager::new(encoder, EmbeddingOptions::from(&config.embedding))?;
        let fusion = strategy_from_config(&config.search);
        Ok(Self {
            config,
            chunker,
            embeddings,
            fusion,
            live: RwLock::new(None),
            build_gate: tokio::sync::Mutex::new(()),
            persist_lock: Mutex::new(()),
        })
    }

    /// Like [`new`](Self::new), then loads the configured snapshot if one exists.
    pub fn open(config: EngineConfig, encoder: Arc<dyn Encoder>) -> Result<Self> {
        let path = config.index.snapshot_path();
        let manager = Self::new(config, encoder)?;
        manager.load_if_present(&path)?;
        Ok(manager)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn embeddings(&self) -> &EmbeddingManager {
        &self.embeddings
    }

    pub fn fusion_name(&self) -> &'static str {
        self.fusion.name()
    }

    /// Chunk, embed and index `docs`, then replace the live corpus.
    pub async fn build_from_corpus(&self, docs: Vec<SourceDocument>) -> Result<BuildReport> {
        let _gate = self.build_gate.try_lock().map_err(|_| Error::BuildInProgress)?;
        let (corpus, report) = self.assemble(docs).await?;
        self.publish(corpus);
        Ok(report)
    }

    /// Build, write the snapshot, and only then publish the new corpus.
    pub async fn build_and_persist(&self, docs: Vec<SourceDocument>, path: &Path) -> Result<BuildReport> {
        let _gate = self.build_gate.try_lock().map_err(|_| Error::BuildInProgress)?;
        let (corpus, report) = self.assemble(docs).await?;
        if corpus.is_empty() {
            return Err(Error::IndexNotReady("refusing to persist an empty corpus".into()));
        }
        {
            let _persist = self.persist_lock.lock();
            Snapshot::from_corpus(&corpus).write_atomic(path)?;
        }
        self.publish(corpus);
        Ok(report)
    }

    async fn assemble(&self, docs: Vec<SourceDocument>) -> Result<(Corpus, BuildReport)> {
        let started = Instant::now();
        let (docs, duplicates_skipped) = dedupe_sources(docs)?;
        let chunks: Vec<Chunk> = docs.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        info!(sources = docs.len(), chunks = chunks.len(), "chunked corpus");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embeddings.embed(&texts).await?;
        let parts = CorpusParts {
            metric: self.config.index.metric,
            dim: self.embeddings.dim(),
            encoder_id: self.embeddings.encoder_id().to_string(),
        };
        let bm25 = Bm25Params { k1: self.config.index.bm25_k1, b: self.config.index.bm25_b };
        let corpus = Corpus::build(parts, chunks, vectors, bm25)?;

        let report = BuildReport {
            sources: docs.len(),
            duplicates_skipped,
            chunks: corpus.chunks().len(),
            elapsed: started.elapsed(),
        };
        info!(
            sources = report.sources,
            chunks = report.chunks,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "index built"
        );
        Ok((corpus, report))
    }

    fn publish(&self, corpus: Corpus) {
        *self.live.write() = Some(Arc::new(corpus));
    }

    fn current(&self) -> Option<Arc<Corpus>> {
        self.live.read().clone()
    }

    fn ready(&self) -> Result<Arc<Corpus>> {
        match self.current() {
            Some(c) if !c.is_empty() => Ok(c),
            Some(_) => Err(Error::IndexNotReady("the corpus is empty".into())),
            None => Err(Error::IndexNotReady("no index has been built or loaded".into())),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready().is_ok()
    }

    pub fn stats(&self) -> Option<IndexStats> {
        self.current().map(|c| c.stats())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let corpus = self.ready()?;
        let _persist = self.persist_lock.lock();
        Snapshot::from_corpus(&corpus).write_atomic(path)
    }

    /// Replace the live corpus with the snapshot at `path`. On any error the
    /// live corpus is left as it was.
    pub fn load(&self, path: &Path) -> Result<IndexStats> {
        let _persist = self.persist_lock.lock();
        let snapshot = Snapshot::read(path)?;
        if snapshot.metric != self.config.index.metric {
            warn!(
                snapshot = %snapshot.metric,
                configured = %self.config.index.metric,
                "snapshot metric differs from configuration; using the snapshot's"
            );
        }
        let corpus = snapshot.into_corpus(path, self.embeddings.encoder_id(), self.embeddings.dim())?;
        let stats = corpus.stats();
        self.publish(corpus);
        info!(path = %path.display(), chunks = stats.chunks, sources = stats.sources, "snapshot loaded");
        Ok(stats)
    }

    /// `Ok(false)` when there is no file at `path`.
    pub fn load_if_present(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot to load");
            return Ok(false);
        }
        self.load(path).map(|_| true)
    }

    /// Hybrid search with the configured `top_k` and weights.
    pub async fn search(&self, query: &str) -> Result<Vec<RankedChunk>> {
        let weights = FusionWeights::from(&self.config.search);
        self.hybrid_search(query, self.config.search.top_k, weights).await
    }

    pub async fn hybrid_search(&self, query: &str, k: usize, weights: FusionWeights) -> Result<Vec<RankedChunk>> {
        check_query(query, k)?;
        weights.validate()?;
        let corpus = self.ready()?;
        let pool = k.saturating_mul(self.config.search.candidate_multiplier);

        let query_vec = self.embeddings.embed_query(query).await?;
        let vector_hits = corpus.vector().search(&query_vec, pool)?;
        let keyword_hits = corpus.keyword().search(query, pool)?;
        let fused = self.fusion.fuse(&vector_hits, &keyword_hits, weights);
        debug!(
            vector = vector_hits.len(),
            keyword = keyword_hits.len(),
            fused = fused.len(),
            strategy = self.fusion.name(),
            "hybrid candidates"
        );

        Ok(fused
            .into_iter()
            .take(k)
            .filter_map(|h| {
                corpus.chunk(&h.id).map(|chunk| RankedChunk {
                    chunk: chunk.clone(),
                    score: h.score,
                    vector_score: h.vector_score,
                    keyword_score: h.keyword_score,
                })
            })
            .collect())
    }

    pub async fn vector_search(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        check_query(query, k)?;
        let corpus = self.ready()?;
        let query_vec = self.embeddings.embed_query(query).await?;
        let hits = corpus.vector().search(&query_vec, k)?;
        Ok(resolve(&corpus, hits))
    }

    pub async fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        check_query(query, k)?;
        let corpus = self.ready()?;
        let hits = corpus.keyword().search(query, k)?;
        Ok(resolve(&corpus, hits))
    }
}

fn check_query(query: &str, k: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::invalid("query", "must not be blank"));
    }
    if k == 0 {
        return Err(Error::invalid("k", "must be greater than zero"));
    }
    Ok(())
}

fn resolve(corpus: &Corpus, hits: Vec<SearchHit>) -> Vec<RankedChunk> {
    hits.into_iter()
        .filter_map(|h| {
            let (vector_score, keyword_score) = match h.source {
                SourceKind::Vector => (Some(h.score), None),
                SourceKind::Keyword => (None, Some(h.score)),
            };
            corpus
                .chunk(&h.id)
                .map(|chunk| RankedChunk { chunk: chunk.clone(), score: h.score, vector_score, keyword_score })
        })
        .collect()
}

/// Drop repeated sources, keeping first-seen order. A repeated id with
/// different text is an error.
fn dedupe_sources(docs: Vec<SourceDocument>) -> Result<(Vec<SourceDocument>, usize)> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<SourceDocument> = Vec::with_capacity(docs.len());
    let mut skipped = 0;
    for doc in docs {
        if doc.id.trim().is_empty() {
            return Err(Error::invalid("documents", "source id must not be blank"));
        }
        match seen.get(&doc.id) {
            Some(&i) if kept[i].text == doc.text => {
                warn!(source = %doc.id, "duplicate source skipped");
                skipped += 1;
            }
            Some(_) => {
                return Err(Error::invalid(
                    "documents",
                    format!("source id `{}` appears twice with different text", doc.id),
                ));
            }
            None => {
                seen.insert(doc.id.clone(), kept.len());
                kept.push(doc);
            }
        }
    }
    Ok((kept, skipped))
}
