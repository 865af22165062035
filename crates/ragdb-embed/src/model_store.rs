//! Process-wide cache of downloaded model files.
//!
//! A store is created lazily per cache directory by [`ModelStore::global`] and
//! lives for the rest of the process. Each model is fetched at most once
//! unless it is explicitly evicted.
use anyhow::{anyhow, Context, Result};
use hf_hub::api::sync::ApiBuilder;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Local paths of everything needed to load a BERT-family encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Use a model directory already on disk; safetensors weights win over
    /// a pickled `pytorch_model.bin`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config = dir.join("config.json");
        let tokenizer = dir.join("tokenizer.json");
        let weights = ["model.safetensors", "pytorch_model.bin"]
            .iter()
            .map(|f| dir.join(f))
            .find(|p| p.is_file())
            .ok_or_else(|| anyhow!("no model weights under {}", dir.display()))?;
        for p in [&config, &tokenizer] {
            if !p.is_file() {
                return Err(anyhow!("missing {}", p.display()));
            }
        }
        Ok(Self { config, tokenizer, weights })
    }
}

pub struct ModelStore {
    cache_dir: PathBuf,
    entries: Mutex<HashMap<String, Arc<ModelFiles>>>,
}

static STORES: OnceLock<Mutex<HashMap<PathBuf, Arc<ModelStore>>>> = OnceLock::new();

impl ModelStore {
    /// The shared store for `cache_dir`, created on first use.
    pub fn global(cache_dir: &Path) -> Arc<ModelStore> {
        let stores = STORES.get_or_init(|| Mutex::new(HashMap::new()));
        let mut stores = stores.lock();
        Arc::clone(stores.entry(cache_dir.to_path_buf()).or_insert_with(|| {
            Arc::new(ModelStore { cache_dir: cache_dir.to_path_buf(), entries: Mutex::new(HashMap::new()) })
        }))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Resolve `model_id` to local files. A path to an existing directory is
    /// used as-is; anything else is a Hugging Face hub repo id.
    pub fn fetch(&self, model_id: &str) -> Result<Arc<ModelFiles>> {
        // Held across the download so concurrent callers never fetch twice.
        let mut entries = self.entries.lock();
        if let Some(files) = entries.get(model_id) {
            return Ok(Arc::clone(files));
        }
        let local = Path::new(model_id);
        let files = if local.is_dir() {
            ModelFiles::from_dir(local)?
        } else {
            self.download(model_id)?
        };
        let files = Arc::new(files);
        entries.insert(model_id.to_string(), Arc::clone(&files));
        Ok(files)
    }

    /// Forget a resolved model so the next `fetch` resolves it again.
    pub fn evict(&self, model_id: &str) -> bool {
        self.entries.lock().remove(model_id).is_some()
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.entries.lock().contains_key(model_id)
    }

    fn download(&self, model_id: &str) -> Result<ModelFiles> {
        std::fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("creating model cache {}", self.cache_dir.display()))?;
        info!(model = model_id, cache = %self.cache_dir.display(), "fetching model from hub");
        let api = ApiBuilder::new().with_cache_dir(self.cache_dir.clone()).with_progress(false).build()?;
        let repo = api.model(model_id.to_string());
        let config = repo.get("config.json").with_context(|| format!("{model_id}: config.json"))?;
        let tokenizer = repo.get("tokenizer.json").with_context(|| format!("{model_id}: tokenizer.json"))?;
        let weights = match repo.get("model.safetensors") {
            Ok(p) => p,
            Err(_) => repo.get("pytorch_model.bin").with_context(|| format!("{model_id}: no weights"))?,
        };
        Ok(ModelFiles { config, tokenizer, weights })
    }
}
