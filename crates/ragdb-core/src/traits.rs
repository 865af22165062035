/// A text encoder producing fixed-size dense vectors.
///
/// `id()` names the model and its parameters; two encoders with the same id
/// must produce the same vectors for the same input. Snapshots record it so
/// an index is never queried with a different encoder than it was built with.
pub trait Encoder: Send + Sync {
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut out = self.encode_batch(&[text.to_string()])?;
        out.pop().ok_or_else(|| anyhow::anyhow!("encoder `{}` returned no vector", self.id()))
    }
}
