pub mod engine;
pub mod index;
pub mod similarity;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(test)]
mod engine_tests;

pub use engine::{DedupConfig, DedupStats, Deduplicator};
pub use index::{IndexItem, NullIndex, QdrantIndex, SemanticIndex, SemanticMatch};
