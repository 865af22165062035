//! ragdb-text
//!
//! Lexical retrieval: the English analysis chain (tantivy tokenizers and
//! filters) and an in-memory BM25 index over chunks.
pub mod analyzer;
pub mod index;

pub use analyzer::Analyzer;
pub use index::{Bm25Params, KeywordIndex, KeywordStats};
