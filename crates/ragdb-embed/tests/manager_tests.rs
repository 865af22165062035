use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ragdb_core::traits::Encoder;
use ragdb_core::Error;
use ragdb_embed::{EmbeddingManager, EmbeddingOptions, HashEncoder};

/// Encodes each text as `[len, 1, 0, ...]` and counts what it was asked for.
struct Counting {
    dim: usize,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl Counting {
    fn new(dim: usize) -> Self {
        Self { dim, calls: AtomicUsize::new(0), texts: AtomicUsize::new(0) }
    }
}

impl Encoder for Counting {
    fn id(&self) -> &str {
        "counting"
    }
    fn dim(&self) -> usize {
        self.dim
    }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; self.dim];
                v[0] = t.chars().count() as f32;
                v[1] = 1.0;
                v
            })
            .collect())
    }
}

struct Slow;

impl Encoder for Slow {
    fn id(&self) -> &str {
        "slow"
    }
    fn dim(&self) -> usize {
        2
    }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(vec![vec![1.0, 0.0]; texts.len()])
    }
}

/// Misbehaves in a configurable way.
enum Malformed {
    WrongDim,
    WrongCount,
    NaN,
    Fails,
    Panics,
}

impl Encoder for Malformed {
    fn id(&self) -> &str {
        "malformed"
    }
    fn dim(&self) -> usize {
        4
    }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        match self {
            Malformed::WrongDim => Ok(vec![vec![1.0; 3]; texts.len()]),
            Malformed::WrongCount => Ok(vec![vec![1.0; 4]; texts.len() + 1]),
            Malformed::NaN => Ok(vec![vec![f32::NAN; 4]; texts.len()]),
            Malformed::Fails => Err(anyhow::anyhow!("backend unavailable")),
            Malformed::Panics => panic!("encoder crashed"),
        }
    }
}

fn options(batch_size: usize) -> EmbeddingOptions {
    EmbeddingOptions { batch_size, normalize: false, ..EmbeddingOptions::default() }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn preserves_order_across_batches() {
    let manager = EmbeddingManager::new(Arc::new(Counting::new(4)), options(2)).unwrap();
    let texts = strings(&["a", "bbb", "cc", "dddd", "eeeee"]);
    let out = manager.embed(&texts).await.unwrap();
    assert_eq!(out.len(), texts.len());
    let lens: Vec<f32> = out.iter().map(|v| v[0]).collect();
    assert_eq!(lens, [1.0, 3.0, 2.0, 4.0, 5.0]);
}

#[tokio::test]
async fn cache_hits_skip_the_encoder() {
    let encoder = Arc::new(Counting::new(4));
    let manager = EmbeddingManager::new(encoder.clone(), options(8)).unwrap();
    let first = manager.embed(&strings(&["alpha", "beta"])).await.unwrap();
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);

    let again = manager.embed(&strings(&["beta", "alpha"])).await.unwrap();
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(again[0], first[1]);
    assert_eq!(manager.cache_len(), 2);

    manager.clear_cache();
    manager.embed(&strings(&["alpha"])).await.unwrap();
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn duplicate_inputs_are_encoded_once() {
    let encoder = Arc::new(Counting::new(4));
    let manager = EmbeddingManager::new(encoder.clone(), options(8)).unwrap();
    let out = manager.embed(&strings(&["same", "same  ", " same", "other"])).await.unwrap();
    assert_eq!(out.len(), 4);
    assert_eq!(encoder.texts.load(Ordering::SeqCst), 2, "whitespace is collapsed before caching");
    assert_eq!(out[0], out[2]);
}

#[tokio::test]
async fn query_uses_the_same_path() {
    let manager = EmbeddingManager::new(Arc::new(HashEncoder::new(32)), EmbeddingOptions::default()).unwrap();
    let q = manager.embed_query("What is  dynamic typing?").await.unwrap();
    let d = manager.embed(&strings(&["What is dynamic typing?"])).await.unwrap();
    assert_eq!(q, d[0]);
}

#[tokio::test]
async fn preprocessing_lowercases_and_truncates() {
    let encoder = Arc::new(Counting::new(4));
    let opts = EmbeddingOptions { lowercase: true, max_input_chars: Some(3), ..options(4) };
    let manager = EmbeddingManager::new(encoder.clone(), opts).unwrap();
    let out = manager.embed(&strings(&["ABCDEF", "abcxyz", "ab"])).await.unwrap();
    assert_eq!(out[0][0], 3.0);
    assert_eq!(out[2][0], 2.0);
    assert_eq!(encoder.texts.load(Ordering::SeqCst), 2, "`abc` is shared after truncation");
}

#[tokio::test]
async fn normalizes_when_asked() {
    let opts = EmbeddingOptions { normalize: true, ..options(4) };
    let manager = EmbeddingManager::new(Arc::new(Counting::new(2)), opts).unwrap();
    let v = manager.embed_query("abc").await.unwrap();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn timeout_is_an_encoding_error() {
    let opts = EmbeddingOptions { timeout: Duration::from_millis(50), ..options(4) };
    let manager = EmbeddingManager::new(Arc::new(Slow), opts).unwrap();
    let err = manager.embed(&strings(&["x"])).await.unwrap_err();
    assert!(matches!(err, Error::Encoding { .. }), "{err}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn malformed_output_is_an_encoding_error() {
    for bad in [Malformed::WrongDim, Malformed::WrongCount, Malformed::NaN, Malformed::Fails, Malformed::Panics] {
        let manager = EmbeddingManager::new(Arc::new(bad), options(4)).unwrap();
        let err = manager.embed(&strings(&["x", "y"])).await.unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }), "{err}");
        assert_eq!(manager.cache_len(), 0);
    }
}

#[tokio::test]
async fn empty_input_is_empty_output() {
    let encoder = Arc::new(Counting::new(4));
    let manager = EmbeddingManager::new(encoder.clone(), options(4)).unwrap();
    assert!(manager.embed(&[]).await.unwrap().is_empty());
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_options_are_rejected() {
    let zero_batch = EmbeddingOptions { batch_size: 0, ..EmbeddingOptions::default() };
    assert!(matches!(
        EmbeddingManager::new(Arc::new(HashEncoder::new(8)), zero_batch),
        Err(Error::Configuration { .. })
    ));
    let zero_workers = EmbeddingOptions { workers: 0, ..EmbeddingOptions::default() };
    assert!(EmbeddingManager::new(Arc::new(HashEncoder::new(8)), zero_workers).is_err());
}
