//! Engine configuration and path helpers.
//!
//! Uses Figment to merge `ragdb.toml` + `ragdb.<env>.toml` + `RAGDB_*` env vars
//! (`__` separates nested keys, e.g. `RAGDB_SEARCH__TOP_K=8`).
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Metric;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RAGDB_ENV").unwrap_or_else(|_| "dev".to_string());
        let figment = Figment::new()
            .merge(Toml::file("ragdb.toml"))
            .merge(Toml::file(format!("ragdb.{env_name}.toml")))
            .merge(Env::prefixed("RAGDB_").ignore(&["ENV"]).split("__"));
        Ok(Self { figment })
    }

    /// Config from an explicit file, still overridable by `RAGDB_*` variables.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::config("config", format!("{} is not a file", path.display())));
        }
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("RAGDB_").ignore(&["ENV"]).split("__"));
        Ok(Self { figment })
    }

    /// Config from a TOML string only; no files or environment are consulted.
    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment.extract_inner(key).map_err(|e| Error::config(key, e.to_string()))
    }

    /// Extract and validate the whole engine configuration.
    pub fn engine(&self) -> Result<EngineConfig> {
        let cfg: EngineConfig = self
            .figment
            .extract()
            .map_err(|e| Error::config(extraction_path(&e), e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn extraction_path(e: &figment::Error) -> String {
    if e.path.is_empty() {
        "<root>".to_string()
    } else {
        e.path.join(".")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.embedding.validate()?;
        self.index.validate()?;
        self.search.validate()
    }
}

/// Chunk sizes in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 100, min_chunk_size: 200 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size", "must be greater than zero"));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::config(
                "chunking.overlap",
                format!("{} must be smaller than chunk_size {}", self.overlap, self.chunk_size),
            ));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(Error::config(
                "chunking.min_chunk_size",
                format!("{} exceeds chunk_size {}", self.min_chunk_size, self.chunk_size),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    Bert,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub encoder: EncoderKind,
    pub model_id: String,
    pub hash_dim: usize,
    pub max_tokens: usize,
    pub batch_size: usize,
    pub workers: usize,
    pub timeout_ms: u64,
    pub lowercase: bool,
    pub max_input_chars: Option<usize>,
    pub normalize: bool,
    pub model_cache_dir: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderKind::Bert,
            model_id: "BAAI/bge-small-en-v1.5".to_string(),
            hash_dim: 384,
            max_tokens: 256,
            batch_size: 32,
            workers: 2,
            timeout_ms: 30_000,
            lowercase: false,
            max_input_chars: None,
            normalize: true,
            model_cache_dir: "~/.cache/ragdb/models".to_string(),
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("embedding.hash_dim", self.hash_dim),
            ("embedding.max_tokens", self.max_tokens),
            ("embedding.batch_size", self.batch_size),
            ("embedding.workers", self.workers),
        ];
        for (param, value) in positive {
            if value == 0 {
                return Err(Error::config(param, "must be greater than zero"));
            }
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("embedding.timeout_ms", "must be greater than zero"));
        }
        if self.max_input_chars == Some(0) {
            return Err(Error::config("embedding.max_input_chars", "must be greater than zero"));
        }
        if self.encoder == EncoderKind::Bert && self.model_id.trim().is_empty() {
            return Err(Error::config("embedding.model_id", "required for the bert encoder"));
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        expand_path(&self.model_cache_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub metric: Metric,
    pub snapshot_path: String,
    pub bm25_k1: f32,
    pub bm25_b: f32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            snapshot_path: "data/ragdb.snapshot.json".to_string(),
            bm25_k1: 1.2,
            bm25_b: 0.75,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.bm25_k1.is_finite() || self.bm25_k1 < 0.0 {
            return Err(Error::config("index.bm25_k1", "must be finite and non-negative"));
        }
        if !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(Error::config("index.bm25_b", "must be within [0, 1]"));
        }
        if self.snapshot_path.trim().is_empty() {
            return Err(Error::config("index.snapshot_path", "must not be empty"));
        }
        Ok(())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        expand_path(&self.snapshot_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionKind {
    Weighted,
    Rrf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub fusion: FusionKind,
    pub rrf_k: f32,
    pub candidate_multiplier: usize,
    pub min_score: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            vector_weight: 0.5,
            keyword_weight: 0.5,
            fusion: FusionKind::Weighted,
            rrf_k: 60.0,
            candidate_multiplier: 2,
            min_score: 0.0,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::config("search.top_k", "must be greater than zero"));
        }
        if self.candidate_multiplier == 0 {
            return Err(Error::config("search.candidate_multiplier", "must be greater than zero"));
        }
        for (param, w) in [("search.vector_weight", self.vector_weight), ("search.keyword_weight", self.keyword_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::config(param, "must be finite and non-negative"));
            }
        }
        if self.vector_weight + self.keyword_weight <= 0.0 {
            return Err(Error::config("search.keyword_weight", "weights must not both be zero"));
        }
        if !self.rrf_k.is_finite() || self.rrf_k < 0.0 {
            return Err(Error::config("search.rrf_k", "must be finite and non-negative"));
        }
        if !self.min_score.is_finite() {
            return Err(Error::config("search.min_score", "must be finite"));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}
