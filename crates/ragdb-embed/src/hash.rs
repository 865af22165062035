use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use ragdb_core::traits::Encoder;

const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic feature-hashing encoder. Needs no model files, so it backs
/// offline use and tests.
///
/// Each lowercase alphanumeric token adds 1.0 to its hashed bucket, and each
/// of its boundary-marked character trigrams adds 0.5, so inflections of a
/// word land close together. Output is L2-normalized and never negative.
#[derive(Debug, Clone)]
pub struct HashEncoder {
    dim: usize,
    id: String,
}

impl HashEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), id: format!("hash-v1:d{}", dim.max(1)) }
    }

    fn bucket(&self, feature: &str) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        feature.hash(&mut hasher);
        (hasher.finish() % self.dim as u64) as usize
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lower = text.to_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            v[self.bucket(token)] += 1.0;
            let marked: Vec<char> = std::iter::once('#').chain(token.chars()).chain(std::iter::once('#')).collect();
            for w in marked.windows(3) {
                let gram: String = w.iter().collect();
                v[self.bucket(&gram)] += TRIGRAM_WEIGHT;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Encoder for HashEncoder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }
}
