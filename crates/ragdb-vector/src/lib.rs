//! ragdb-vector
//!
//! Exact nearest-neighbour search over chunk embeddings.
pub mod index;
pub mod metric;

pub use index::VectorIndex;
pub use ragdb_core::types::Metric;
