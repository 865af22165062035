use ragdb_core::types::Metric;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Similarity of `query` to a stored vector whose norm is already known.
/// Cosine against a zero vector is 0.
pub fn similarity(metric: Metric, query: &[f32], query_norm: f32, stored: &[f32], stored_norm: f32) -> f32 {
    let d = dot(query, stored);
    match metric {
        Metric::Dot => d,
        Metric::Cosine => {
            if query_norm == 0.0 || stored_norm == 0.0 {
                0.0
            } else {
                d / (query_norm * stored_norm)
            }
        }
    }
}
