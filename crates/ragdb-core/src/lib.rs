#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, Chunks};
pub use config::{ChunkingConfig, Config, EmbeddingConfig, EngineConfig, IndexConfig, SearchConfig};
pub use error::{Error, Result};
pub use traits::Encoder;
pub use types::{Chunk, ChunkId, Embedding, Evidence, Meta, Metric, RankedChunk, SearchHit, SourceDocument, SourceKind};
