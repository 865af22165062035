use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Model inputs for one batch, each `[B, T]` where `T` is the longest
/// (truncated) sequence in the batch.
pub struct BatchInputs {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<BatchInputs> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let n = enc.get_ids().len().min(max_len);
        rows.push((
            enc.get_ids()[..n].to_vec(),
            enc.get_type_ids()[..n].to_vec(),
            enc.get_attention_mask()[..n].to_vec(),
        ));
    }
    let width = rows.iter().map(|(ids, _, _)| ids.len()).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(rows.len() * width);
    let mut types = Vec::with_capacity(rows.len() * width);
    let mut mask = Vec::with_capacity(rows.len() * width);
    for (row_ids, row_types, row_mask) in rows {
        let pad = width - row_ids.len();
        ids.extend(row_ids.into_iter().chain(std::iter::repeat(pad_id).take(pad)));
        types.extend(row_types.into_iter().chain(std::iter::repeat(0).take(pad)));
        mask.extend(row_mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let shape = (texts.len(), width);
    Ok(BatchInputs {
        input_ids: Tensor::from_vec(ids, shape, device)?,
        token_type_ids: Tensor::from_vec(types, shape, device)?,
        attention_mask: Tensor::from_vec(mask, shape, device)?,
    })
}
