//! Hybrid relevance scoring: semantic candidates blended with keyword
//! overlap, boosted by importance, structure, and accumulated feedback.
//!
//! The semantic channel is external: [`hybrid_search`](RelevanceScorer::hybrid_search)
//! fans query variants out to the [`SemanticIndex`] collaborator and merges
//! the candidate sets. Everything after that is local and deterministic.
//! When the collaborator yields no candidates at all, whether it failed or
//! simply had none, the search degrades to pure keyword scoring over the
//! cached entries instead of surfacing the error.

use std::collections::HashMap;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RelevanceConfig;
use crate::memory::expand::significant_terms;
use crate::memory::types::{Importance, MemoryEntry};
use crate::semantic::SemanticIndex;

// ── Public types ──────────────────────────────────────────────────────────────

/// A retrieval result with its score breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub entry: MemoryEntry,
    /// Collaborator similarity after the feedback boost, `0.0` in keyword fallback.
    pub semantic_score: f64,
    /// Fraction of query keywords present, with the capped repeat bonus.
    pub keyword_score: f64,
    /// Final boosted score the results are ordered by.
    pub score: f64,
}

/// Per-call search knobs. `None` fields fall back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub min_score: Option<f64>,
    /// Cap the keyword score near zero when any query keyword is missing.
    pub require_all_keywords: bool,
}

/// Knobs for [`RelevanceScorer::best_memories`].
#[derive(Debug, Clone)]
pub struct BestMemoriesOptions {
    pub search: SearchOptions,
    /// Reserve a share of slots for critical/high-importance results.
    pub reserve_priority: bool,
}

impl Default for BestMemoriesOptions {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            reserve_priority: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FeedbackTally {
    positive: u32,
    total: u32,
}

// ── Scorer ────────────────────────────────────────────────────────────────────

pub struct RelevanceScorer {
    config: RelevanceConfig,
    feedback: HashMap<String, FeedbackTally>,
}

impl RelevanceScorer {
    pub fn new(config: RelevanceConfig) -> Self {
        Self {
            config,
            feedback: HashMap::new(),
        }
    }

    /// Blend external semantic scores with local keyword scores.
    ///
    /// `variants` are the expanded/clustered forms sent to the collaborator;
    /// keyword scoring always uses the original `query`. Results are sorted by
    /// non-increasing score, filtered at the minimum, and capped at the limit.
    pub async fn hybrid_search(
        &self,
        query: &str,
        variants: &[String],
        memories: &HashMap<String, MemoryEntry>,
        index: &dyn SemanticIndex,
        options: &SearchOptions,
    ) -> Vec<ScoredMemory> {
        let limit = options.limit.unwrap_or(self.config.default_limit);
        let min_score = options.min_score.unwrap_or(self.config.min_relevance_score);
        let candidate_limit = limit * 3;

        // 1. Fan variants out to the collaborator and join
        let searched = if variants.is_empty() {
            vec![index.search(query, candidate_limit).await]
        } else {
            join_all(
                variants
                    .iter()
                    .map(|variant| index.search(variant, candidate_limit)),
            )
            .await
        };

        // 2. Merge candidates, keeping each id's best semantic score
        let mut semantic: HashMap<String, f64> = HashMap::new();
        for result in &searched {
            match result {
                Ok(hits) => {
                    for hit in hits {
                        let best = semantic.entry(hit.id.clone()).or_insert(hit.score);
                        if hit.score > *best {
                            *best = hit.score;
                        }
                    }
                }
                Err(err) => warn!("semantic search variant failed: {err}"),
            }
        }

        // 3. Degrade to a pure keyword scan when the channel came back empty
        if semantic.is_empty() {
            debug!("no semantic candidates, falling back to keyword scan");
            return self.keyword_fallback(query, memories, options, limit, min_score);
        }

        // 4. Score candidates present in the cache
        let query_terms = significant_terms(query);
        let mut results: Vec<ScoredMemory> = semantic
            .into_iter()
            .filter_map(|(id, raw_semantic)| {
                let entry = memories.get(&id)?;
                let boosted_semantic = raw_semantic * self.feedback_boost(&id);
                let keyword = self.keyword_score(&query_terms, &entry.content, options);
                let combined = boosted_semantic * self.config.semantic_weight
                    + keyword * self.config.keyword_weight;
                let score = combined * self.boost_factor(entry);
                Some(ScoredMemory {
                    entry: entry.clone(),
                    semantic_score: boosted_semantic,
                    keyword_score: keyword,
                    score,
                })
            })
            .collect();

        // 5. Filter, order, cap
        results.retain(|r| r.score >= min_score);
        sort_by_score(&mut results);
        results.truncate(limit);
        results
    }

    /// Top results with a reserved share of slots for important entries.
    ///
    /// Draws from a wider candidate pool than the requested limit so that
    /// critical/high entries ranked below the cut are still eligible for the
    /// reserved slots.
    pub async fn best_memories(
        &self,
        query: &str,
        variants: &[String],
        memories: &HashMap<String, MemoryEntry>,
        index: &dyn SemanticIndex,
        limit: usize,
        options: &BestMemoriesOptions,
    ) -> Vec<ScoredMemory> {
        let pool_options = SearchOptions {
            limit: Some(limit * 3),
            ..options.search.clone()
        };
        let pool = self
            .hybrid_search(query, variants, memories, index, &pool_options)
            .await;

        if !options.reserve_priority {
            return pool.into_iter().take(limit).collect();
        }

        let reserved_slots = (limit as f64 * self.config.priority_share).ceil() as usize;
        let mut selected: Vec<ScoredMemory> = Vec::with_capacity(limit);

        // Priority entries first, up to the reservation
        for result in &pool {
            if selected.len() >= reserved_slots {
                break;
            }
            if result.entry.importance >= Importance::High {
                selected.push(result.clone());
            }
        }

        // Fill the rest by score regardless of importance
        for result in pool {
            if selected.len() >= limit {
                break;
            }
            if !selected.iter().any(|s| s.entry.id == result.entry.id) {
                selected.push(result);
            }
        }

        sort_by_score(&mut selected);
        selected
    }

    /// Record a caller's relevance verdict for an entry.
    pub fn record_feedback(&mut self, id: &str, relevant: bool) {
        let tally = self.feedback.entry(id.to_string()).or_default();
        tally.total += 1;
        if relevant {
            tally.positive += 1;
        }
    }

    /// Positive-feedback fraction for an entry; neutral `1.0` with no feedback.
    pub fn feedback_boost(&self, id: &str) -> f64 {
        match self.feedback.get(id) {
            Some(tally) if tally.total > 0 => f64::from(tally.positive) / f64::from(tally.total),
            _ => 1.0,
        }
    }

    // ── Internal scoring ─────────────────────────────────────────────────────

    /// Keyword-only scan over the cache, used when the semantic channel
    /// produced nothing to score.
    fn keyword_fallback(
        &self,
        query: &str,
        memories: &HashMap<String, MemoryEntry>,
        options: &SearchOptions,
        limit: usize,
        min_score: f64,
    ) -> Vec<ScoredMemory> {
        let query_terms = significant_terms(query);
        let mut results: Vec<ScoredMemory> = memories
            .values()
            .filter_map(|entry| {
                let keyword = self.keyword_score(&query_terms, &entry.content, options);
                // Keyword score carries full weight here
                let score = keyword * self.boost_factor(entry);
                (score >= min_score).then(|| ScoredMemory {
                    entry: entry.clone(),
                    semantic_score: 0.0,
                    keyword_score: keyword,
                    score,
                })
            })
            .collect();
        sort_by_score(&mut results);
        results.truncate(limit);
        results
    }

    /// Fraction of query terms present as whole words, plus a capped bonus for
    /// repeated occurrences.
    fn keyword_score(&self, query_terms: &[String], content: &str, options: &SearchOptions) -> f64 {
        if query_terms.is_empty() {
            return 0.0;
        }

        let mut occurrences: HashMap<String, u32> = HashMap::new();
        for token in content.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            *occurrences.entry(token.to_lowercase()).or_default() += 1;
        }

        let mut matched = 0usize;
        let mut bonus = 0.0f64;
        for term in query_terms {
            let Some(&count) = occurrences.get(term) else {
                continue;
            };
            matched += 1;
            if count > 1 {
                bonus += f64::from(count - 1) * self.config.repeat_bonus;
            }
        }

        let base = matched as f64 / query_terms.len() as f64;
        let score = (base + bonus.min(self.config.repeat_bonus_cap)).min(1.0);

        if options.require_all_keywords && matched < query_terms.len() {
            return score.min(0.05);
        }
        score
    }

    /// Multiplicative boosts for importance and structured content.
    fn boost_factor(&self, entry: &MemoryEntry) -> f64 {
        let mut boost = match entry.importance {
            Importance::Critical => self.config.critical_boost,
            Importance::High => self.config.high_boost,
            _ => 1.0,
        };
        if has_structure(&entry.content) {
            boost *= self.config.structure_boost;
        }
        boost
    }
}

/// Non-increasing score order, ties broken by id for determinism.
fn sort_by_score(results: &mut [ScoredMemory]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
}

/// Headings or numbered lists mark curated content.
fn has_structure(content: &str) -> bool {
    content.lines().any(|line| {
        let trimmed = line.trim_start();
        trimmed.starts_with('#') || is_numbered_item(trimmed)
    })
}

fn is_numbered_item(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    line[digits.len()..].starts_with(". ") || line[digits.len()..].starts_with(") ")
}
