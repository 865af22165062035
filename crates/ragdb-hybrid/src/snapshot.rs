//! On-disk corpus snapshot.
//!
//! A single JSON document holding chunks, raw embedding bytes and BM25
//! statistics. Everything but `created_at` is a pure function of the corpus,
//! the configuration and the encoder.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::{Chunk, Embedding, Metric};
use ragdb_text::KeywordStats;

use crate::corpus::{Corpus, CorpusParts};

#[cfg(not(target_endian = "little"))]
compile_error!("snapshot embeddings are stored as little-endian f32 bytes");

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderInfo {
    pub id: String,
    pub dim: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub created_at: String,
    pub encoder: EncoderInfo,
    pub metric: Metric,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<String>,
    pub keyword: KeywordStats,
}

/// Read first so a future format is reported as such rather than as a
/// parse failure somewhere inside it.
#[derive(Deserialize)]
struct Header {
    format_version: u32,
}

pub fn encode_vector(v: &[f32]) -> String {
    STANDARD.encode(bytemuck::cast_slice::<f32, u8>(v))
}

pub fn decode_vector(s: &str, dim: usize) -> std::result::Result<Embedding, String> {
    let bytes = STANDARD.decode(s).map_err(|e| e.to_string())?;
    if bytes.len() != dim * 4 {
        return Err(format!("{} bytes, expected {}", bytes.len(), dim * 4));
    }
    let mut out = vec![0f32; dim];
    bytemuck::cast_slice_mut::<f32, u8>(&mut out).copy_from_slice(&bytes);
    Ok(out)
}

impl Snapshot {
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let vector = corpus.vector();
        Self {
            format_version: FORMAT_VERSION,
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            encoder: EncoderInfo { id: corpus.encoder_id().to_string(), dim: vector.dim() },
            metric: vector.metric(),
            chunks: corpus.chunks().to_vec(),
            embeddings: vector.embeddings().iter().map(|v| encode_vector(v)).collect(),
            keyword: corpus.keyword().stats().clone(),
        }
    }

    /// Write to a temp file next to `path` and rename it over `path`.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| Error::io(&parent, e))?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut w, self)
                .map_err(|e| Error::io(path, std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            w.flush().map_err(|e| Error::io(path, e))?;
        }
        tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
        tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
        info!(path = %path.display(), chunks = self.chunks.len(), "snapshot written");
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let header: Header =
            serde_json::from_slice(&bytes).map_err(|e| Error::corrupt(path, format!("unreadable header: {e}")))?;
        if header.format_version != FORMAT_VERSION {
            return Err(Error::corrupt(
                path,
                format!("format version {} is not supported (expected {FORMAT_VERSION})", header.format_version),
            ));
        }
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt(path, e.to_string()))
    }

    /// Validate against the running encoder and rebuild both indexes.
    pub fn into_corpus(self, path: &Path, encoder_id: &str, dim: usize) -> Result<Corpus> {
        if self.encoder.id != encoder_id {
            return Err(Error::corrupt(
                path,
                format!("built with encoder `{}`, configured encoder is `{encoder_id}`", self.encoder.id),
            ));
        }
        if self.encoder.dim != dim {
            return Err(Error::corrupt(path, format!("dimension {} does not match encoder dimension {dim}", self.encoder.dim)));
        }
        if self.embeddings.len() != self.chunks.len() {
            return Err(Error::corrupt(
                path,
                format!("{} embeddings for {} chunks", self.embeddings.len(), self.chunks.len()),
            ));
        }
        let embeddings = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, s)| decode_vector(s, dim).map_err(|e| Error::corrupt(path, format!("embedding {i}: {e}"))))
            .collect::<Result<Vec<_>>>()?;
        let parts = CorpusParts { metric: self.metric, dim, encoder_id: self.encoder.id };
        Corpus::from_parts(parts, self.chunks, embeddings, self.keyword).map_err(|e| Error::corrupt(path, e.to_string()))
    }
}
