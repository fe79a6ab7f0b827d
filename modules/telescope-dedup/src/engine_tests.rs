//! Engine tests — MOCK → mark_duplicates → assert assignments.
//!
//! Fuzzy-only paths use `Deduplicator::new`; semantic paths inject the
//! in-memory index from `testing`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use telescope_common::{Message, TelescopeError};

use crate::engine::{DedupConfig, Deduplicator};
use crate::index::NullIndex;
use crate::similarity::fuzzy_ratio;
use crate::testing::*;

fn assignments(messages: &[Message]) -> Vec<(bool, Option<Uuid>, u8)> {
    messages
        .iter()
        .map(|m| (m.is_duplicate, m.duplicate_group_id, m.originality_score))
        .collect()
}

// ---------------------------------------------------------------------------
// Degenerate batches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_batch_is_a_noop() {
    let deduper = Deduplicator::new(DedupConfig::default());
    let mut batch: Vec<Message> = Vec::new();
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();
    assert_eq!(stats.processed, 0);
}

#[tokio::test]
async fn single_message_stays_unique() {
    let deduper = Deduplicator::new(DedupConfig::default());
    let mut batch = vec![message("Explosion reported in Kyiv overnight.")];
    deduper.mark_duplicates(&mut batch).await.unwrap();

    assert!(!batch[0].is_duplicate);
    assert_eq!(batch[0].duplicate_group_id, None);
    assert_eq!(batch[0].originality_score, 100);
}

// ---------------------------------------------------------------------------
// Exact-hash path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exact_duplicates_group_in_either_order() {
    let deduper = Deduplicator::new(DedupConfig::default());

    for flip in [false, true] {
        let mut batch = vec![
            message("Explosion reported in Kyiv overnight."),
            message("Explosion reported in Kyiv overnight."),
        ];
        if flip {
            batch.reverse();
        }

        deduper.mark_duplicates(&mut batch).await.unwrap();

        let canonical_id = batch[0].id;
        assert!(!batch[0].is_duplicate);
        assert_eq!(batch[0].duplicate_group_id, Some(canonical_id));
        assert_eq!(batch[0].originality_score, 100);
        assert!(batch[1].is_duplicate);
        assert_eq!(batch[1].duplicate_group_id, Some(canonical_id));
        assert_eq!(batch[1].originality_score, 0);
    }
}

#[tokio::test]
async fn hash_normalization_groups_case_and_whitespace_variants() {
    let deduper = Deduplicator::new(DedupConfig::default());
    let mut batch = vec![
        message("Breaking   NEWS: explosion\treported"),
        message("breaking news: explosion reported"),
    ];
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(stats.exact_duplicates, 1);
    assert_eq!(batch[1].duplicate_group_id, Some(batch[0].id));
}

#[tokio::test]
async fn cross_channel_exact_duplicates_group() {
    // Channel and publish time never influence grouping.
    let deduper = Deduplicator::new(DedupConfig::default());
    let base = Utc::now();
    let mut batch = vec![
        message_at(Uuid::new_v4(), "Explosion reported in Kyiv.", base),
        message_at(
            Uuid::new_v4(),
            "Explosion reported in Kyiv.",
            base + Duration::hours(3),
        ),
    ];
    deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(batch[1].duplicate_group_id, Some(batch[0].id));
    assert!(batch[1].is_duplicate);
}

// ---------------------------------------------------------------------------
// Fuzzy path and threshold boundary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn similarity_exactly_at_threshold_groups() {
    // fuzzy_ratio("0123456789", "0123456xyz") == 0.7 exactly.
    let deduper = Deduplicator::new(DedupConfig::with_threshold(0.7));
    let mut batch = vec![message("0123456789"), message("0123456xyz")];
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(stats.fuzzy_duplicates, 1);
    assert!(batch[1].is_duplicate);
    assert_eq!(batch[1].duplicate_group_id, Some(batch[0].id));
    assert_eq!(batch[1].originality_score, 30);
}

#[tokio::test]
async fn similarity_below_threshold_stays_unique() {
    // fuzzy_ratio("0123456789", "012345wxyz") == 0.6.
    let deduper = Deduplicator::new(DedupConfig::with_threshold(0.7));
    let mut batch = vec![message("0123456789"), message("012345wxyz")];
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(stats.groups_created, 2);
    assert!(!batch[1].is_duplicate);
    assert_eq!(batch[0].duplicate_group_id, None);
    assert_eq!(batch[1].duplicate_group_id, None);
}

#[tokio::test]
async fn originality_score_tracks_similarity() {
    // fuzzy_ratio("0123456789", "01234567xy") == 0.8 -> originality 20.
    let deduper = Deduplicator::new(DedupConfig::with_threshold(0.7));
    let mut batch = vec![message("0123456789"), message("01234567xy")];
    deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(batch[1].originality_score, 20);
}

#[tokio::test]
async fn first_group_above_threshold_wins_over_later_members() {
    // B joins A's group (0.8). C is close enough to B (0.7) but is only
    // compared against the canonical A (0.5), so it starts its own group.
    let a = "0123456789";
    let b = "23456789ab";
    let c = "56789abcde";
    assert!(fuzzy_ratio(b, c) >= 0.7);
    assert!(fuzzy_ratio(a, c) < 0.7);

    let deduper = Deduplicator::new(DedupConfig::with_threshold(0.7));
    let mut batch = vec![message(a), message(b), message(c)];
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(stats.groups_created, 2);
    assert_eq!(batch[1].duplicate_group_id, Some(batch[0].id));
    assert!(!batch[2].is_duplicate);
    assert_eq!(batch[2].duplicate_group_id, None);
}

// ---------------------------------------------------------------------------
// Empty-text exemption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_text_is_never_grouped() {
    let deduper = Deduplicator::new(DedupConfig::default());
    let mut batch = vec![
        empty_message(),
        empty_message(),
        no_text_message(),
        no_text_message(),
        message("actual content"),
    ];
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(stats.skipped_empty, 4);
    for m in &batch {
        assert!(!m.is_duplicate);
        assert_eq!(m.duplicate_group_id, None);
        assert_eq!(m.originality_score, 100);
    }
}

// ---------------------------------------------------------------------------
// Semantic path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reordered_sentences_group_through_the_index() {
    // Word-for-word reorder: fuzzy ratio lands below 0.7, but the
    // bag-of-tokens embeddings are identical, so the semantic path
    // catches it.
    let index = Arc::new(InMemoryIndex::new());
    let deduper = Deduplicator::with_index(DedupConfig::with_threshold(0.7), index.clone());

    let mut batch = vec![
        message("Authorities confirm explosion reported in Kyiv overnight."),
        message("Explosion reported in Kyiv overnight; authorities confirm."),
        message("Sunny weather expected in Paris this weekend."),
    ];
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();

    assert!(!batch[0].is_duplicate);
    assert_eq!(batch[0].duplicate_group_id, Some(batch[0].id));
    assert!(batch[1].is_duplicate);
    assert_eq!(batch[1].duplicate_group_id, Some(batch[0].id));
    assert!(batch[1].originality_score < 100);
    assert!(!batch[2].is_duplicate);
    assert_eq!(batch[2].duplicate_group_id, None);

    assert_eq!(stats.semantic_duplicates, 1);
    assert_eq!(index.len(), 3);
}

#[tokio::test]
async fn failing_index_degrades_to_fuzzy_only() {
    // Every backend call errors; the batch must still complete with
    // correct exact/fuzzy grouping and no error escaping.
    let deduper = Deduplicator::with_index(DedupConfig::with_threshold(0.7), Arc::new(FailingIndex));

    let mut batch = vec![
        message("Explosion reported in Kyiv overnight."),
        message("Explosion reported in Kyiv overnight."),
        message("0123456xyz"),
        message("0123456789"),
        message("Sunny weather expected in Paris."),
    ];
    let stats = deduper.mark_duplicates(&mut batch).await.unwrap();

    assert_eq!(stats.exact_duplicates, 1);
    assert_eq!(stats.fuzzy_duplicates, 1);
    assert_eq!(batch[1].duplicate_group_id, Some(batch[0].id));
    assert_eq!(batch[3].duplicate_group_id, Some(batch[2].id));
    assert!(!batch[4].is_duplicate);
}

#[tokio::test]
async fn null_index_behaves_like_no_index() {
    let with_null = Deduplicator::with_index(DedupConfig::with_threshold(0.7), Arc::new(NullIndex));
    let without = Deduplicator::new(DedupConfig::with_threshold(0.7));

    let make_batch = || {
        vec![
            message_at(Uuid::nil(), "0123456789", Utc::now()),
            message_at(Uuid::nil(), "0123456xyz", Utc::now()),
        ]
    };

    let mut a = make_batch();
    let mut b = make_batch();
    with_null.mark_duplicates(&mut a).await.unwrap();
    without.mark_duplicates(&mut b).await.unwrap();

    assert_eq!(a[1].is_duplicate, b[1].is_duplicate);
    assert_eq!(a[1].originality_score, b[1].originality_score);
}

#[tokio::test]
async fn malformed_index_metadata_is_a_hard_failure() {
    let deduper = Deduplicator::with_index(DedupConfig::default(), Arc::new(MalformedIndex));
    let mut batch = vec![message("first message"), message("second message")];

    let err = deduper.mark_duplicates(&mut batch).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TelescopeError>(),
        Some(TelescopeError::Contract(_))
    ));
}

// ---------------------------------------------------------------------------
// Idempotence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rerunning_a_batch_reproduces_assignments() {
    let index = Arc::new(InMemoryIndex::new());
    let deduper = Deduplicator::with_index(DedupConfig::with_threshold(0.7), index);

    let mut batch = vec![
        message("Authorities confirm explosion reported in Kyiv overnight."),
        message("Explosion reported in Kyiv overnight; authorities confirm."),
        message("Explosion reported in Kyiv overnight; authorities confirm."),
        message("Sunny weather expected in Paris this weekend."),
        empty_message(),
    ];

    deduper.mark_duplicates(&mut batch).await.unwrap();
    let first = assignments(&batch);

    deduper.mark_duplicates(&mut batch).await.unwrap();
    assert_eq!(assignments(&batch), first);
}

#[tokio::test]
async fn fuzzy_only_rerun_is_idempotent() {
    let deduper = Deduplicator::new(DedupConfig::with_threshold(0.7));
    let mut batch = vec![
        message("0123456789"),
        message("0123456xyz"),
        message("completely different"),
    ];

    deduper.mark_duplicates(&mut batch).await.unwrap();
    let first = assignments(&batch);

    deduper.mark_duplicates(&mut batch).await.unwrap();
    assert_eq!(assignments(&batch), first);
}

// ---------------------------------------------------------------------------
// find_duplicates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn find_duplicates_reports_groups_without_mutating() {
    let index = Arc::new(InMemoryIndex::new());
    let deduper = Deduplicator::with_index(DedupConfig::default(), index.clone());

    let batch = vec![
        message("Explosion reported in Kyiv."),
        message("Explosion reported in Kyiv."),
        message("Sunny weather expected in Paris."),
    ];
    let before = assignments(&batch);

    let groups = deduper.find_duplicates(&batch).await.unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[&batch[0].id], vec![batch[0].id, batch[1].id]);
    assert_eq!(groups[&batch[2].id], vec![batch[2].id]);

    // Inspection only: no field mutation, no index writes.
    assert_eq!(assignments(&batch), before);
    assert!(index.is_empty());
}
