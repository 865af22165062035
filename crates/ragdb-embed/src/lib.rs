//! ragdb-embed
//!
//! Encoders (feature hashing and candle BERT), the model file store, and the
//! batching/caching [`EmbeddingManager`] the index is built with.
use std::sync::Arc;

use ragdb_core::config::{EmbeddingConfig, EncoderKind};
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Encoder;

pub mod bert;
pub mod device;
pub mod hash;
pub mod manager;
pub mod model_store;
pub mod pool;
pub mod tokenize;

pub use bert::BertEncoder;
pub use hash::HashEncoder;
pub use manager::{EmbeddingManager, EmbeddingOptions};
pub use model_store::{ModelFiles, ModelStore};
pub use pool::masked_mean_l2;

/// Build the encoder named by the configuration. BERT models are fetched
/// through the shared [`ModelStore`] for the configured cache directory.
pub fn encoder_from_config(cfg: &EmbeddingConfig) -> Result<Arc<dyn Encoder>> {
    match cfg.encoder {
        EncoderKind::Hash => Ok(Arc::new(HashEncoder::new(cfg.hash_dim))),
        EncoderKind::Bert => {
            let store = ModelStore::global(&cfg.cache_dir());
            let files = store
                .fetch(&cfg.model_id)
                .map_err(|e| Error::encoding_with(format!("resolving model `{}`", cfg.model_id), e))?;
            let encoder = BertEncoder::load(&files, &cfg.model_id, cfg.max_tokens)
                .map_err(|e| Error::encoding_with(format!("loading model `{}`", cfg.model_id), e))?;
            Ok(Arc::new(encoder))
        }
    }
}
