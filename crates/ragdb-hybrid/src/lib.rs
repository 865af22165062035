//! ragdb-hybrid
//!
//! The index manager (build, publish, persist, search), score fusion, the
//! snapshot format, and the question-to-evidence pipeline.
pub mod corpus;
pub mod fusion;
pub mod manager;
pub mod pipeline;
pub mod snapshot;

pub use corpus::{Corpus, IndexStats};
pub use fusion::{FusionStrategy, FusionWeights, ReciprocalRank, WeightedSum};
pub use manager::{BuildReport, IndexManager};
pub use pipeline::{PipelineOptions, RagPipeline};
pub use snapshot::Snapshot;
