#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ragdb_core::config::{EncoderKind, EngineConfig};
use ragdb_core::traits::Encoder;
use ragdb_core::types::{Meta, SourceDocument};
use ragdb_embed::HashEncoder;
use ragdb_hybrid::IndexManager;

pub const DIM: usize = 256;

pub fn config(dir: &Path) -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.embedding.encoder = EncoderKind::Hash;
    cfg.embedding.hash_dim = DIM;
    cfg.index.snapshot_path = dir.join("ragdb.snapshot.json").to_string_lossy().into_owned();
    cfg
}

pub fn encoder() -> Arc<dyn Encoder> {
    Arc::new(HashEncoder::new(DIM))
}

pub fn manager(dir: &Path) -> IndexManager {
    IndexManager::new(config(dir), encoder()).unwrap()
}

pub fn languages() -> Vec<SourceDocument> {
    vec![
        SourceDocument::with_id("python", "Python is a dynamically typed programming language.", Meta::new()),
        SourceDocument::with_id("rust", "Rust guarantees memory safety without a garbage collector.", Meta::new()),
        SourceDocument::with_id("java", "Java is a statically typed language that runs on the JVM.", Meta::new()),
    ]
}

/// A longer corpus that produces several chunks per source.
pub fn handbook() -> Vec<SourceDocument> {
    let topics = [
        ("storage", "Snapshots are written to a temporary file and renamed into place."),
        ("search", "Hybrid retrieval fuses dense vector similarity with BM25 keyword scores."),
        ("chunking", "Chunks are cut at paragraph, sentence or word boundaries."),
    ];
    topics
        .iter()
        .map(|(id, line)| {
            let text = (0..30).map(|i| format!("{line} Note {i}.")).collect::<Vec<_>>().join(" ");
            let mut meta = Meta::new();
            meta.insert("topic".into(), (*id).to_string());
            SourceDocument::with_id(*id, text, meta)
        })
        .collect()
}

/// Hash encoder that takes its time, to keep a build in flight.
pub struct SlowEncoder {
    inner: HashEncoder,
    delay: Duration,
}

impl SlowEncoder {
    pub fn new(delay: Duration) -> Self {
        Self { inner: HashEncoder::new(DIM), delay }
    }
}

impl Encoder for SlowEncoder {
    fn id(&self) -> &str {
        self.inner.id()
    }
    fn dim(&self) -> usize {
        DIM
    }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        std::thread::sleep(self.delay);
        self.inner.encode_batch(texts)
    }
}

/// Encoder with hand-picked unit vectors, so vector ranks are known exactly.
/// Unknown texts are an error.
pub struct FixedEncoder {
    table: HashMap<String, Vec<f32>>,
}

impl FixedEncoder {
    pub fn new(entries: &[(&str, [f32; 3])]) -> Self {
        Self { table: entries.iter().map(|(t, v)| ((*t).to_string(), v.to_vec())).collect() }
    }
}

impl Encoder for FixedEncoder {
    fn id(&self) -> &str {
        "fixed-v1"
    }
    fn dim(&self) -> usize {
        3
    }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| self.table.get(t).cloned().ok_or_else(|| anyhow::anyhow!("no vector for {t:?}")))
            .collect()
    }
}

/// Savanna corpus for [`FixedEncoder`]: `beta` is close to the query
/// `"zebra"` but never mentions it, `gamma` mentions it but points elsewhere.
pub fn savanna() -> (FixedEncoder, Vec<SourceDocument>) {
    let docs = [
        ("alpha", "Zebras graze on the open savanna.", [1.0, 0.0, 0.0]),
        ("beta", "Giraffes browse tall acacia trees.", [0.8, 0.6, 0.0]),
        ("gamma", "The zebra count rose this year.", [0.0, 0.0, 1.0]),
        ("delta", "Elephants dig for water.", [0.0, 1.0, 0.0]),
    ];
    let mut entries: Vec<(&str, [f32; 3])> = docs.iter().map(|(_, t, v)| (*t, *v)).collect();
    entries.push(("zebra", [1.0, 0.0, 0.0]));
    let encoder = FixedEncoder::new(&entries);
    let sources = docs.iter().map(|(id, t, _)| SourceDocument::with_id(*id, *t, Meta::new())).collect();
    (encoder, sources)
}
