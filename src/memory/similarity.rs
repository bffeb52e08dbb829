//! Pairwise text similarity behind a swappable trait.
//!
//! Consolidation grouping and graph mirroring both compare memory contents.
//! The metric is isolated behind [`Similarity`] so the edit-distance default
//! can be swapped without touching callers.

use std::collections::HashSet;

/// Scores two texts in `[0.0, 1.0]`, 1.0 meaning identical.
pub trait Similarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Normalized Levenshtein similarity: `1 − distance / max_len`.
///
/// Quadratic in input length; intended for the short contents that reach
/// consolidation, not documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditDistance;

impl Similarity for EditDistance {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let max_len = a_chars.len().max(b_chars.len());
        if max_len == 0 {
            return 1.0;
        }
        1.0 - levenshtein(&a_chars, &b_chars) as f64 / max_len as f64
    }
}

/// Two-row Levenshtein distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Jaccard overlap of whitespace-delimited, lowercased word sets.
///
/// Cheap enough for bulk graph mirroring where edit distance would be O(n²)
/// per pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordOverlap;

impl Similarity for KeywordOverlap {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a_words: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
        let b_words: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
        if a_words.is_empty() && b_words.is_empty() {
            return 1.0;
        }
        let union = a_words.union(&b_words).count();
        if union == 0 {
            return 0.0;
        }
        let intersection = a_words.intersection(&b_words).count();
        intersection as f64 / union as f64
    }
}
