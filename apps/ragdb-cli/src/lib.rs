//! Shared plumbing for the `ragdb-indexer` and `ragdb-search` binaries.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ragdb_core::config::{resolve_with_base, Config, EngineConfig};
use ragdb_core::types::{Meta, SourceDocument};

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Engine settings plus the CLI-only `[ingest]` section.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub engine: EngineConfig,
    /// `ingest.source_dir`: default directory for `ragdb-indexer`.
    pub source_dir: Option<PathBuf>,
}

/// `--config <file>` when given, else the layered `ragdb.toml` lookup.
///
/// Relative paths in an explicit config file are taken relative to the
/// file's directory.
pub fn load_config(config_file: Option<&Path>) -> Result<CliConfig> {
    let (config, base) = match config_file {
        Some(p) => (Config::from_file(p)?, p.parent().map(Path::to_path_buf).unwrap_or_default()),
        None => (Config::load()?, PathBuf::new()),
    };
    let mut engine = config.engine()?;
    engine.index.snapshot_path = resolve_with_base(&base, &engine.index.snapshot_path).to_string_lossy().into_owned();
    let source_dir = config.get::<String>("ingest.source_dir").ok().map(|dir| resolve_with_base(&base, dir));
    debug!(snapshot = %engine.index.snapshot_path, source_dir = ?source_dir, "configuration loaded");
    Ok(CliConfig { engine, source_dir })
}

/// Every `.txt` file under `root`, sorted by path.
pub fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    files.sort();
    files
}

/// Read `.txt` files as sources. The id is the path relative to `root`; the
/// parent directory is recorded as `category`.
pub fn read_sources(root: &Path) -> Result<Vec<SourceDocument>> {
    let mut docs = Vec::new();
    for path in list_txt_files(root) {
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let category = relative
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "misc".to_string());
        let mut meta = Meta::new();
        meta.insert("path".into(), path.to_string_lossy().into_owned());
        meta.insert("category".into(), category);
        docs.push(SourceDocument::with_id(relative.to_string_lossy(), text, meta));
    }
    info!(root = %root.display(), sources = docs.len(), "read source files");
    Ok(docs)
}
