//! Test mocks for the dedup engine.
//!
//! Three mocks against the two trait boundaries:
//! - `HashEmbedder` (TextEmbedder) — deterministic bag-of-tokens vectors
//! - `InMemoryIndex` (SemanticIndex) — stateful in-memory vector store
//! - `FailingIndex` / `MalformedIndex` (SemanticIndex) — failure modes
//!
//! Plus small builders for `Message` fixtures.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use telescope_common::{Message, TextEmbedder};

use crate::index::{IndexItem, SemanticIndex, SemanticMatch};
use crate::similarity::cosine_similarity;

/// Standard embedding dimension for test vectors.
pub const TEST_EMBEDDING_DIM: usize = 64;

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedder: each lowercase alphanumeric token hashes into a
/// bucket, then the vector is L2-normalized. Reordered sentences with the
/// same tokens embed identically (cosine 1.0).
#[derive(Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(embed_text(text, TEST_EMBEDDING_DIM))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| embed_text(t, TEST_EMBEDDING_DIM))
            .collect())
    }
}

pub fn embed_text(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimensions];
    let lowered = text.to_lowercase();
    for token in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let digest = Sha256::digest(token.as_bytes());
        let bucket = u64::from_be_bytes(digest[..8].try_into().expect("8-byte slice"))
            % dimensions as u64;
        vector[bucket as usize] += 1.0;
    }

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

// ---------------------------------------------------------------------------
// InMemoryIndex
// ---------------------------------------------------------------------------

/// In-memory vector store backed by `HashEmbedder`. Upserts replace by id;
/// queries honor the `published_at_ts` recency cutoff, matching the
/// production backend's filter semantics.
#[derive(Default)]
pub struct InMemoryIndex {
    entries: Mutex<HashMap<Uuid, (Vec<f32>, serde_json::Value)>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SemanticIndex for InMemoryIndex {
    fn is_ready(&self) -> bool {
        true
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        HashEmbedder.embed_batch(texts).await
    }

    async fn upsert(&self, items: Vec<IndexItem>) -> Result<Vec<Uuid>> {
        let mut entries = self.entries.lock().expect("index lock poisoned");
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let vector = embed_text(&item.text, TEST_EMBEDDING_DIM);
            entries.insert(item.id, (vector, item.metadata));
            ids.push(item.id);
        }
        Ok(ids)
    }

    async fn query_similar(
        &self,
        text: &str,
        top_k: usize,
        published_after: Option<i64>,
    ) -> Result<Vec<SemanticMatch>> {
        let query = embed_text(text, TEST_EMBEDDING_DIM);
        let entries = self.entries.lock().expect("index lock poisoned");

        let mut matches: Vec<SemanticMatch> = entries
            .iter()
            .filter(|(_, (_, metadata))| match published_after {
                Some(cutoff) => metadata
                    .get("published_at_ts")
                    .and_then(|v| v.as_i64())
                    .is_some_and(|ts| ts >= cutoff),
                None => true,
            })
            .map(|(id, (vector, metadata))| SemanticMatch {
                id: id.to_string(),
                score: cosine_similarity(&query, vector),
                metadata: metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}

// ---------------------------------------------------------------------------
// Failure-mode indexes
// ---------------------------------------------------------------------------

/// Reports ready but fails every call. Exercises the transient-error
/// fallback: the engine must finish the batch fuzzy-only.
pub struct FailingIndex;

#[async_trait]
impl SemanticIndex for FailingIndex {
    fn is_ready(&self) -> bool {
        true
    }

    async fn embed(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        bail!("vector backend unavailable")
    }

    async fn upsert(&self, _items: Vec<IndexItem>) -> Result<Vec<Uuid>> {
        bail!("vector backend unavailable")
    }

    async fn query_similar(
        &self,
        _text: &str,
        _top_k: usize,
        _published_after: Option<i64>,
    ) -> Result<Vec<SemanticMatch>> {
        bail!("vector backend unavailable")
    }
}

/// Returns matches whose metadata cannot be mapped back to a message id.
/// Exercises the contract-violation hard failure.
pub struct MalformedIndex;

#[async_trait]
impl SemanticIndex for MalformedIndex {
    fn is_ready(&self) -> bool {
        true
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        HashEmbedder.embed_batch(texts).await
    }

    async fn upsert(&self, items: Vec<IndexItem>) -> Result<Vec<Uuid>> {
        Ok(items.into_iter().map(|i| i.id).collect())
    }

    async fn query_similar(
        &self,
        _text: &str,
        _top_k: usize,
        _published_after: Option<i64>,
    ) -> Result<Vec<SemanticMatch>> {
        Ok(vec![SemanticMatch {
            id: "not-a-uuid".to_string(),
            score: 0.99,
            metadata: serde_json::json!({ "message_id": "garbage" }),
        }])
    }
}

// ---------------------------------------------------------------------------
// Message builders
// ---------------------------------------------------------------------------

pub fn message(text: &str) -> Message {
    Message::new(Uuid::new_v4(), text, Utc::now())
}

pub fn message_at(channel_id: Uuid, text: &str, published_at: DateTime<Utc>) -> Message {
    Message::new(channel_id, text, published_at)
}

pub fn empty_message() -> Message {
    message("")
}

pub fn no_text_message() -> Message {
    let mut m = message("placeholder");
    m.original_text = None;
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_text_is_order_insensitive() {
        let a = embed_text("explosion reported in kyiv", TEST_EMBEDDING_DIM);
        let b = embed_text("kyiv reported in explosion", TEST_EMBEDDING_DIM);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn embed_text_is_normalized() {
        let v = embed_text("some message text", TEST_EMBEDDING_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn embed_text_empty_is_zero_vector() {
        let v = embed_text("", TEST_EMBEDDING_DIM);
        assert!(v.iter().all(|&x| x == 0.0));
    }
}
