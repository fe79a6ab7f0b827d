//! Semantic index boundary: embedding-backed nearest-neighbour lookup.
//!
//! The engine talks to `SemanticIndex` only. `QdrantIndex` is the
//! production implementation; `NullIndex` is the not-ready stub. Any
//! backend absence or failure degrades the engine to fuzzy-only
//! comparison instead of failing the batch.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use qdrant_client::{Distance, PointRecord, QdrantClient};
use tracing::{info, warn};
use uuid::Uuid;

use telescope_common::{Config, TextEmbedder};

/// A message to index: id, embeddable text, and JSON metadata stored
/// alongside the vector.
#[derive(Debug, Clone)]
pub struct IndexItem {
    pub id: Uuid,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// A nearest-neighbour hit from the index.
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    /// Point id as reported by the backend.
    pub id: String,
    /// Similarity score (cosine for the default collection setup).
    pub score: f64,
    pub metadata: serde_json::Value,
}

impl SemanticMatch {
    /// The indexed message's id, from `message_id` metadata or the point
    /// id itself. An unparseable id is an integration bug, not a
    /// transient condition.
    pub fn message_id(&self) -> Result<Uuid> {
        let raw = self
            .metadata
            .get("message_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.id);
        Uuid::parse_str(raw)
            .map_err(|_| anyhow!("unparseable message id {raw:?} in index match metadata"))
    }
}

#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Whether the backend is configured and reachable. A not-ready index
    /// is skipped entirely by the engine.
    fn is_ready(&self) -> bool;

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Upsert items keyed by their id. Re-upserting an id overwrites it.
    async fn upsert(&self, items: Vec<IndexItem>) -> Result<Vec<Uuid>>;

    /// Top-k nearest matches for `text`, restricted to entries whose
    /// `published_at_ts` metadata is at or after `published_after`.
    async fn query_similar(
        &self,
        text: &str,
        top_k: usize,
        published_after: Option<i64>,
    ) -> Result<Vec<SemanticMatch>>;
}

/// No-op stub that reports "not ready". Useful as a default wiring when
/// no vector backend is deployed.
pub struct NullIndex;

#[async_trait]
impl SemanticIndex for NullIndex {
    fn is_ready(&self) -> bool {
        false
    }

    async fn embed(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(Vec::new())
    }

    async fn upsert(&self, _items: Vec<IndexItem>) -> Result<Vec<Uuid>> {
        Ok(Vec::new())
    }

    async fn query_similar(
        &self,
        _text: &str,
        _top_k: usize,
        _published_after: Option<i64>,
    ) -> Result<Vec<SemanticMatch>> {
        Ok(Vec::new())
    }
}

/// Qdrant-backed semantic index over an injected embedding provider.
pub struct QdrantIndex {
    client: QdrantClient,
    embedder: Arc<dyn TextEmbedder>,
    collection: String,
}

impl QdrantIndex {
    /// Connect and ensure the collection exists.
    ///
    /// Returns `Ok(None)` when no backend is configured or the backend is
    /// unreachable; callers then run fuzzy-only dedup.
    pub async fn connect(config: &Config, embedder: Arc<dyn TextEmbedder>) -> Result<Option<Self>> {
        let Some(url) = config.qdrant_url.as_deref() else {
            info!("QDRANT_URL not set, semantic dedup disabled");
            return Ok(None);
        };

        let client = QdrantClient::new(
            url,
            config.qdrant_api_key.as_deref(),
            config.qdrant_timeout_seconds,
        );

        match client
            .ensure_collection(
                &config.qdrant_collection,
                config.embedding_dimension,
                Distance::parse(&config.qdrant_distance),
            )
            .await
        {
            Ok(()) => Ok(Some(Self {
                client,
                embedder,
                collection: config.qdrant_collection.clone(),
            })),
            Err(e) => {
                warn!(error = %e, "Vector store init failed, semantic dedup disabled");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SemanticIndex for QdrantIndex {
    fn is_ready(&self) -> bool {
        true
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.embedder.embed_batch(texts).await
    }

    async fn upsert(&self, items: Vec<IndexItem>) -> Result<Vec<Uuid>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = items.iter().map(|i| i.text.clone()).collect();
        let vectors = self.embedder.embed_batch(texts).await?;

        let points: Vec<PointRecord> = items
            .iter()
            .zip(vectors)
            .map(|(item, vector)| PointRecord {
                id: item.id,
                vector,
                payload: item.metadata.clone(),
            })
            .collect();

        self.client.upsert_points(&self.collection, &points).await?;
        Ok(items.iter().map(|i| i.id).collect())
    }

    async fn query_similar(
        &self,
        text: &str,
        top_k: usize,
        published_after: Option<i64>,
    ) -> Result<Vec<SemanticMatch>> {
        let vector = self.embedder.embed(text).await?;
        let hits = self
            .client
            .search(&self.collection, &vector, top_k, published_after)
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| SemanticMatch {
                id: match hit.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                score: hit.score,
                metadata: hit.payload,
            })
            .collect())
    }
}
