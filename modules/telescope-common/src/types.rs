use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A collected channel message, as loaded from the message store.
///
/// The dedup engine only ever mutates the three output fields
/// (`is_duplicate`, `duplicate_group_id`, `originality_score`);
/// content and identifiers are write-once upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Source channel. Cross-channel duplicates are expected; this field
    /// never influences grouping.
    pub channel_id: Uuid,
    /// Text to deduplicate. `None` or blank text is treated as unique.
    pub original_text: Option<String>,
    /// Publish time. Only bounds which messages are compared together.
    pub published_at: DateTime<Utc>,
    /// False for a group's canonical (first) message, true for the rest.
    pub is_duplicate: bool,
    /// Shared by all members of one duplicate group (the canonical
    /// message's own id). `None` for ungrouped singletons.
    pub duplicate_group_id: Option<Uuid>,
    /// 0-100. 100 = unique; drops as similarity to an earlier group
    /// member rises.
    pub originality_score: u8,
}

impl Message {
    pub fn new(channel_id: Uuid, text: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            original_text: Some(text.into()),
            published_at,
            is_duplicate: false,
            duplicate_group_id: None,
            originality_score: 100,
        }
    }

    /// Trimmed text content, or `None` for missing/blank text.
    pub fn text(&self) -> Option<&str> {
        self.original_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Dyn-compatible embedding provider boundary.
///
/// Production wiring injects whatever vendor client the host application
/// uses; tests inject a deterministic hash-based embedder.
#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
