//! Grouping, assignment, and originality scoring.
//!
//! One synchronous pass over a batch of messages the caller has already
//! loaded (typically "new messages plus the recent window"). Three
//! detectors compose, cheapest first:
//!
//! 1. exact content-hash match on normalized text;
//! 2. fuzzy character ratio against each existing group's canonical
//!    message;
//! 3. semantic cosine score from the vector index, when one is ready.
//!
//! Group membership is first-match-wins in group creation order, and
//! candidates are only compared against each group's canonical (first)
//! message — never against later members. Both choices are deliberate:
//! they keep the pass deterministic for a given insertion order and
//! linear-ish in the number of groups. The cost is that a message
//! similar to a non-canonical member but not to the canonical one will
//! start its own group. Known limitation, kept on purpose.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use telescope_common::{content_hash, Config, Message, TelescopeError};

use crate::index::{IndexItem, SemanticIndex};
use crate::similarity::fuzzy_ratio;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Minimum similarity (fuzzy or semantic) for two messages to share
    /// a group. Inclusive: a match exactly at the threshold groups.
    pub similarity_threshold: f64,
    /// Recency window for semantic index queries.
    pub window: Duration,
    /// Nearest neighbours fetched per semantic query.
    pub top_k: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.9,
            window: Duration::hours(24),
            top_k: 5,
        }
    }
}

impl DedupConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            window: Duration::hours(config.dedup_window_hours),
            top_k: config.dedup_top_k,
        }
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
            ..Self::default()
        }
    }
}

/// Counters for one dedup pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub processed: u32,
    pub skipped_empty: u32,
    pub groups_created: u32,
    pub exact_duplicates: u32,
    pub fuzzy_duplicates: u32,
    pub semantic_duplicates: u32,
}

impl std::fmt::Display for DedupStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Messages processed: {}", self.processed)?;
        writeln!(f, "Groups created:     {}", self.groups_created)?;
        writeln!(f, "Exact duplicates:   {}", self.exact_duplicates)?;
        writeln!(f, "Fuzzy duplicates:   {}", self.fuzzy_duplicates)?;
        writeln!(f, "Semantic dupes:     {}", self.semantic_duplicates)?;
        write!(f, "Skipped (empty):    {}", self.skipped_empty)
    }
}

/// Near-duplicate detection engine.
///
/// The semantic index is an explicit constructor dependency rather than
/// a process-wide singleton, so tests can substitute failing or
/// in-memory backends.
pub struct Deduplicator {
    config: DedupConfig,
    index: Option<Arc<dyn SemanticIndex>>,
}

enum Verdict {
    /// Empty/unparseable text: always unique, never grouped.
    Skipped,
    /// First message of its group.
    Canonical { group: usize },
    /// Matched an existing group's canonical message.
    Duplicate { group: usize, similarity: f64 },
}

struct Group {
    canonical: usize,
    members: Vec<usize>,
}

struct Grouping {
    verdicts: Vec<Verdict>,
    groups: Vec<Group>,
    stats: DedupStats,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            index: None,
        }
    }

    pub fn with_index(config: DedupConfig, index: Arc<dyn SemanticIndex>) -> Self {
        Self {
            config,
            index: Some(index),
        }
    }

    /// Mark duplicates in place: populates `is_duplicate`,
    /// `duplicate_group_id`, and `originality_score` on every message.
    ///
    /// No-op for empty or single-element batches. Idempotent: re-running
    /// over an unchanged batch reproduces the same assignments, because
    /// group ids are the canonical message's own id.
    pub async fn mark_duplicates(&self, messages: &mut [Message]) -> Result<DedupStats> {
        if messages.len() <= 1 {
            return Ok(DedupStats::default());
        }

        let grouping = self.group_batch(messages, true).await?;

        for (i, verdict) in grouping.verdicts.iter().enumerate() {
            match *verdict {
                Verdict::Skipped => {
                    messages[i].is_duplicate = false;
                    messages[i].duplicate_group_id = None;
                    messages[i].originality_score = 100;
                }
                Verdict::Canonical { group } => {
                    let solo = grouping.groups[group].members.len() == 1;
                    messages[i].is_duplicate = false;
                    messages[i].duplicate_group_id = if solo { None } else { Some(messages[i].id) };
                    messages[i].originality_score = 100;
                }
                Verdict::Duplicate { group, similarity } => {
                    let canonical_id = messages[grouping.groups[group].canonical].id;
                    messages[i].is_duplicate = true;
                    messages[i].duplicate_group_id = Some(canonical_id);
                    messages[i].originality_score = originality_score(similarity);
                }
            }
        }

        info!(
            processed = grouping.stats.processed,
            groups = grouping.stats.groups_created,
            exact = grouping.stats.exact_duplicates,
            fuzzy = grouping.stats.fuzzy_duplicates,
            semantic = grouping.stats.semantic_duplicates,
            "Dedup pass complete"
        );
        Ok(grouping.stats)
    }

    /// Grouping only, keyed by the canonical message id. Singleton groups
    /// are included. Never mutates messages or writes to the index.
    pub async fn find_duplicates(&self, messages: &[Message]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        let grouping = self.group_batch(messages, false).await?;

        let mut out = HashMap::new();
        for group in &grouping.groups {
            out.insert(
                messages[group.canonical].id,
                group.members.iter().map(|&i| messages[i].id).collect(),
            );
        }
        Ok(out)
    }

    async fn group_batch(&self, messages: &[Message], write_index: bool) -> Result<Grouping> {
        let mut groups: Vec<Group> = Vec::new();
        let mut hash_to_group: HashMap<String, usize> = HashMap::new();
        let mut verdicts: Vec<Verdict> = Vec::with_capacity(messages.len());
        let mut stats = DedupStats::default();

        let index = self.index.as_deref().filter(|i| i.is_ready());
        let cutoff = (Utc::now() - self.config.window).timestamp();

        for (i, message) in messages.iter().enumerate() {
            stats.processed += 1;

            let Some(text) = message.text() else {
                stats.skipped_empty += 1;
                verdicts.push(Verdict::Skipped);
                continue;
            };

            let hash = content_hash(text);
            if let Some(&g) = hash_to_group.get(&hash) {
                // Exact repeat of a group's canonical content. No further
                // comparison needed.
                debug!(
                    message_id = %message.id,
                    canonical_id = %messages[groups[g].canonical].id,
                    "Exact hash match"
                );
                groups[g].members.push(i);
                stats.exact_duplicates += 1;
                verdicts.push(Verdict::Duplicate {
                    group: g,
                    similarity: 1.0,
                });
                if write_index {
                    if let Some(idx) = index {
                        self.upsert_message(idx, message, text).await;
                    }
                }
                continue;
            }

            let semantic = match index {
                Some(idx) => self.semantic_scores(idx, &message.id, text, cutoff).await?,
                None => HashMap::new(),
            };

            let lowered = text.to_lowercase();
            let mut matched = None;
            for (g, group) in groups.iter().enumerate() {
                let canonical = &messages[group.canonical];
                let Some(canonical_text) = canonical.text() else {
                    continue;
                };

                let fuzzy = fuzzy_ratio(&lowered, &canonical_text.to_lowercase());
                let sem = semantic.get(&canonical.id).copied().unwrap_or(0.0);
                let (similarity, is_semantic) = if sem > fuzzy {
                    (sem, true)
                } else {
                    (fuzzy, false)
                };

                // First group at or above the threshold wins, in group
                // creation order. Not best-match: changing the tie-break
                // would change grouping outcomes.
                if similarity >= self.config.similarity_threshold {
                    matched = Some((g, similarity, is_semantic));
                    break;
                }
            }

            match matched {
                Some((g, similarity, is_semantic)) => {
                    debug!(
                        message_id = %message.id,
                        canonical_id = %messages[groups[g].canonical].id,
                        similarity,
                        semantic = is_semantic,
                        "Near-duplicate match"
                    );
                    groups[g].members.push(i);
                    if is_semantic {
                        stats.semantic_duplicates += 1;
                    } else {
                        stats.fuzzy_duplicates += 1;
                    }
                    verdicts.push(Verdict::Duplicate {
                        group: g,
                        similarity,
                    });
                }
                None => {
                    let g = groups.len();
                    groups.push(Group {
                        canonical: i,
                        members: vec![i],
                    });
                    hash_to_group.insert(hash, g);
                    stats.groups_created += 1;
                    verdicts.push(Verdict::Canonical { group: g });
                }
            }

            if write_index {
                if let Some(idx) = index {
                    self.upsert_message(idx, message, text).await;
                }
            }
        }

        Ok(Grouping {
            verdicts,
            groups,
            stats,
        })
    }

    /// Semantic candidate scores for one message, keyed by indexed message
    /// id. Transient backend failures degrade this message to fuzzy-only;
    /// malformed match metadata is a contract violation and fails the pass.
    async fn semantic_scores(
        &self,
        index: &dyn SemanticIndex,
        message_id: &Uuid,
        text: &str,
        cutoff: i64,
    ) -> Result<HashMap<Uuid, f64>> {
        let matches = match index
            .query_similar(text, self.config.top_k, Some(cutoff))
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(
                    message_id = %message_id,
                    error = %e,
                    "Semantic query failed, falling back to fuzzy comparison"
                );
                return Ok(HashMap::new());
            }
        };

        let mut scores = HashMap::new();
        for m in matches {
            let id = m
                .message_id()
                .map_err(|e| TelescopeError::Contract(e.to_string()))?;
            scores.insert(id, m.score);
        }
        Ok(scores)
    }

    async fn upsert_message(&self, index: &dyn SemanticIndex, message: &Message, text: &str) {
        let item = IndexItem {
            id: message.id,
            text: text.to_string(),
            metadata: serde_json::json!({
                "message_id": message.id.to_string(),
                "channel_id": message.channel_id.to_string(),
                "published_at_ts": message.published_at.timestamp(),
                "text_hash": content_hash(text),
            }),
        };

        if let Err(e) = index.upsert(vec![item]).await {
            warn!(message_id = %message.id, error = %e, "Index upsert failed, continuing");
        }
    }
}

/// 0-100 originality from similarity to the matched canonical message.
/// A 0.99 match scores 1; a borderline 0.90 match scores 10.
fn originality_score(similarity: f64) -> u8 {
    (100.0 * (1.0 - similarity)).round().clamp(0.0, 100.0) as u8
}
