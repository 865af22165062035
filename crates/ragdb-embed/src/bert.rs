use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use ragdb_core::traits::Encoder;

use crate::device::select_device;
use crate::model_store::ModelFiles;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// Sentence encoder over a BERT-family checkpoint (BGE, MiniLM, ...): mean
/// pooling over unmasked tokens, then L2 normalization.
pub struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_tokens: usize,
    pad_id: u32,
}

impl BertEncoder {
    pub fn load(files: &ModelFiles, model_id: &str, max_tokens: usize) -> Result<Self> {
        let started = Instant::now();
        let device = select_device();
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("failed to load tokenizer from {}: {e}", files.tokenizer.display()))?;
        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&files.config).with_context(|| files.config.display().to_string())?,
        )
        .with_context(|| format!("parsing {}", files.config.display()))?;
        let weights = load_weights(&files.weights, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
        let dim = config.hidden_size;
        info!(model = model_id, dim, elapsed_ms = started.elapsed().as_millis() as u64, "bert encoder loaded");
        Ok(Self { model, tokenizer, device, id: format!("bert:{model_id}:t{max_tokens}"), dim, max_tokens, pad_id })
    }
}

fn load_weights(path: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let is_safetensors = path.extension().is_some_and(|e| e == "safetensors");
    let weights = if is_safetensors {
        candle_core::safetensors::load(path, device)?
    } else {
        candle_core::pickle::read_all(path)?.into_iter().collect()
    };
    Ok(weights)
}

impl Encoder for BertEncoder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let inputs = tokenize_batch(&self.tokenizer, texts, self.max_tokens, self.pad_id, &self.device)?;
        let hidden = self.model.forward(&inputs.input_ids, &inputs.token_type_ids, Some(&inputs.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &inputs.attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        debug!(batch = texts.len(), elapsed_ms = started.elapsed().as_millis() as u64, "bert batch encoded");
        Ok(out)
    }
}
