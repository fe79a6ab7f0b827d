//! Similarity metrics: character-level fuzzy ratio and embedding cosine.

use similar::{DiffOp, TextDiff};

/// Normalized common-subsequence ratio between two strings, in [0.0, 1.0].
///
/// `2 * matching_chars / (len(a) + len(b))`, computed from the character
/// diff. Symmetric; 1.0 for identical strings, 0.0 when one side is empty
/// and the other is not.
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let diff = TextDiff::from_chars(a, b);
    let matching: usize = diff
        .ops()
        .iter()
        .map(|op| match op {
            DiffOp::Equal { len, .. } => *len,
            _ => 0,
        })
        .sum();

    2.0 * matching as f64 / total as f64
}

/// Cosine similarity for f32 embedding vectors. Returns 0.0 for zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(fuzzy_ratio("breaking news", "breaking news"), 1.0);
    }

    #[test]
    fn empty_vs_nonempty_scores_zero() {
        assert_eq!(fuzzy_ratio("breaking news", ""), 0.0);
        assert_eq!(fuzzy_ratio("", "breaking news"), 0.0);
    }

    #[test]
    fn both_empty_score_one() {
        assert_eq!(fuzzy_ratio("", ""), 1.0);
    }

    #[test]
    fn ratio_is_symmetric() {
        let a = "explosion reported in kyiv";
        let b = "explosion in kyiv reported";
        assert_eq!(fuzzy_ratio(a, b), fuzzy_ratio(b, a));
    }

    #[test]
    fn ratio_matches_common_subsequence_formula() {
        // 7 of 10 characters survive: 2 * 7 / 20 = 0.7 exactly.
        assert_eq!(fuzzy_ratio("0123456789", "0123456xyz"), 0.7);
        // 6 of 10: 0.6.
        assert_eq!(fuzzy_ratio("0123456789", "012345wxyz"), 0.6);
    }

    #[test]
    fn ratio_decreases_with_growing_perturbation() {
        let base = "the quick brown fox jumps over the lazy dog";
        let one = "the quick brown fox jumps over the lazy cat";
        let three = "a quick brown cat jumps onto the lazy dog";
        let s_one = fuzzy_ratio(base, one);
        let s_three = fuzzy_ratio(base, three);
        assert!(s_one > s_three);
        assert!(s_three > fuzzy_ratio(base, "completely unrelated text"));
    }

    #[test]
    fn cosine_identical() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }

    #[test]
    fn cosine_zero_vector() {
        let a = vec![1.0, 0.0, 0.0];
        let z = vec![0.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &z).abs() < 0.001);
    }
}
