//! Batched, cached, time-bounded access to an [`Encoder`].
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use ragdb_core::config::EmbeddingConfig;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Encoder;
use ragdb_core::types::Embedding;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOptions {
    pub batch_size: usize,
    pub workers: usize,
    pub timeout: Duration,
    pub lowercase: bool,
    pub max_input_chars: Option<usize>,
    pub normalize: bool,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self::from(&EmbeddingConfig::default())
    }
}

impl From<&EmbeddingConfig> for EmbeddingOptions {
    fn from(cfg: &EmbeddingConfig) -> Self {
        Self {
            batch_size: cfg.batch_size,
            workers: cfg.workers,
            timeout: Duration::from_millis(cfg.timeout_ms),
            lowercase: cfg.lowercase,
            max_input_chars: cfg.max_input_chars,
            normalize: cfg.normalize,
        }
    }
}

pub struct EmbeddingManager {
    encoder: Arc<dyn Encoder>,
    options: EmbeddingOptions,
    cache: RwLock<HashMap<blake3::Hash, Embedding>>,
}

impl EmbeddingManager {
    pub fn new(encoder: Arc<dyn Encoder>, options: EmbeddingOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(Error::config("embedding.batch_size", "must be greater than zero"));
        }
        if options.workers == 0 {
            return Err(Error::config("embedding.workers", "must be greater than zero"));
        }
        if options.timeout.is_zero() {
            return Err(Error::config("embedding.timeout_ms", "must be greater than zero"));
        }
        if encoder.dim() == 0 {
            return Err(Error::config("embedding.encoder", format!("encoder `{}` reports dimension 0", encoder.id())));
        }
        Ok(Self { encoder, options, cache: RwLock::new(HashMap::new()) })
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    pub fn encoder_id(&self) -> &str {
        self.encoder.id()
    }

    pub fn dim(&self) -> usize {
        self.encoder.dim()
    }

    pub fn options(&self) -> &EmbeddingOptions {
        &self.options
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// One embedding per input, in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let prepared: Vec<String> = texts.iter().map(|t| self.prepare(t)).collect();
        let keys: Vec<blake3::Hash> = prepared.iter().map(|t| self.cache_key(t)).collect();
        let cached: Vec<Option<Embedding>> = {
            let cache = self.cache.read();
            keys.iter().map(|k| cache.get(k).cloned()).collect()
        };

        let mut seen = HashSet::new();
        let misses: Vec<(blake3::Hash, String)> = cached
            .iter()
            .zip(keys.iter().zip(&prepared))
            .filter(|(hit, (key, _))| hit.is_none() && seen.insert(**key))
            .map(|(_, (key, text))| (*key, text.clone()))
            .collect();

        let mut fresh: HashMap<blake3::Hash, Embedding> = HashMap::with_capacity(misses.len());
        if !misses.is_empty() {
            let batches: Vec<Vec<String>> = misses
                .chunks(self.options.batch_size)
                .map(|b| b.iter().map(|(_, t)| t.clone()).collect())
                .collect();
            debug!(
                inputs = texts.len(),
                misses = misses.len(),
                batches = batches.len(),
                workers = self.options.workers,
                "dispatching embedding batches"
            );
            let results: Vec<Result<Vec<Embedding>>> = stream::iter(batches.into_iter().enumerate())
                .map(|(i, batch)| self.run_batch(i, batch))
                .buffered(self.options.workers)
                .collect()
                .await;
            let mut vectors = Vec::with_capacity(misses.len());
            for r in results {
                vectors.extend(r?);
            }
            let mut cache = self.cache.write();
            for ((key, _), v) in misses.into_iter().zip(vectors) {
                cache.insert(key, v.clone());
                fresh.insert(key, v);
            }
        }

        cached
            .into_iter()
            .zip(&keys)
            .map(|(hit, key)| match hit {
                Some(v) => Ok(v),
                None => fresh.get(key).cloned().ok_or_else(|| Error::encoding("embedding missing after batch")),
            })
            .collect()
    }

    /// Same preprocessing and encoder path as [`embed`](Self::embed).
    pub async fn embed_query(&self, query: &str) -> Result<Embedding> {
        let mut out = self.embed(&[query.to_string()]).await?;
        out.pop().ok_or_else(|| Error::encoding("no embedding returned for query"))
    }

    fn prepare(&self, text: &str) -> String {
        let mut s = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.options.lowercase {
            s = s.to_lowercase();
        }
        if let Some(max) = self.options.max_input_chars {
            if let Some((cut, _)) = s.char_indices().nth(max) {
                s.truncate(cut);
            }
        }
        s
    }

    fn cache_key(&self, prepared: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.encoder.id().as_bytes());
        hasher.update(b"\0");
        hasher.update(prepared.as_bytes());
        hasher.finalize()
    }

    async fn run_batch(&self, index: usize, batch: Vec<String>) -> Result<Vec<Embedding>> {
        let encoder = Arc::clone(&self.encoder);
        let expected = batch.len();
        let timeout = self.options.timeout;
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || encoder.encode_batch(&batch));
        let joined = tokio::time::timeout(timeout, task)
            .await
            .map_err(|_| Error::encoding(format!("batch {index} timed out after {}ms", timeout.as_millis())))?;
        let vectors = joined
            .map_err(|e| Error::encoding_with(format!("batch {index} worker failed"), e))?
            .map_err(|e| Error::encoding_with(format!("batch {index}: encoder `{}` failed", self.encoder.id()), e))?;

        let elapsed = started.elapsed();
        if elapsed > timeout / 2 {
            warn!(batch = index, elapsed_ms = elapsed.as_millis() as u64, "slow embedding batch");
        }
        self.check_batch(index, expected, vectors)
    }

    fn check_batch(&self, index: usize, expected: usize, mut vectors: Vec<Embedding>) -> Result<Vec<Embedding>> {
        if vectors.len() != expected {
            return Err(Error::encoding(format!(
                "batch {index}: encoder returned {} vectors for {expected} inputs",
                vectors.len()
            )));
        }
        let dim = self.encoder.dim();
        for v in &mut vectors {
            if v.len() != dim {
                return Err(Error::encoding(format!(
                    "batch {index}: vector has {} components, encoder `{}` declares {dim}",
                    v.len(),
                    self.encoder.id()
                )));
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(Error::encoding(format!("batch {index}: non-finite component")));
            }
            if self.options.normalize {
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    v.iter_mut().for_each(|x| *x /= norm);
                }
            }
        }
        Ok(vectors)
    }
}
