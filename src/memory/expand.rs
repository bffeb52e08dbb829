//! Query expansion and topical clustering.
//!
//! [`QueryExpander`] widens recall two ways: appending synonyms from a static
//! domain table, and splitting long multi-topic queries into per-topic
//! sub-queries. Both are purely lexical; no model calls.

use crate::config::ExpansionConfig;

/// Tokens ignored when extracting significant terms.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "will", "with", "that", "this",
    "these", "those", "from", "into", "over", "about", "what", "when", "where",
    "which", "while", "would", "could", "should", "have", "has", "had", "our",
    "their", "your", "its", "all", "any", "can", "did", "does", "not", "but",
    "out", "next", "per", "via", "how", "why", "who",
];

/// Domain synonym table: term → related terms appended on expansion.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("mission", &["purpose", "goal", "objective"]),
    ("vision", &["future", "direction", "aspiration"]),
    ("strategy", &["plan", "approach", "roadmap"]),
    ("budget", &["cost", "spending", "finance"]),
    ("revenue", &["income", "sales", "earnings"]),
    ("customer", &["client", "user", "buyer"]),
    ("product", &["offering", "feature", "solution"]),
    ("marketing", &["promotion", "campaign", "outreach"]),
    ("team", &["staff", "people", "headcount"]),
    ("growth", &["expansion", "scaling", "traction"]),
    ("risk", &["threat", "exposure", "liability"]),
    ("metric", &["measure", "kpi", "indicator"]),
    ("deadline", &["due", "timeline", "schedule"]),
    ("meeting", &["discussion", "sync", "agenda"]),
    ("launch", &["release", "rollout", "ship"]),
];

/// Topical buckets for clustering, matched by substring in either direction.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "planning",
        &["plan", "roadmap", "strategy", "goal", "milestone", "quarter", "objective", "timeline"],
    ),
    (
        "finance",
        &["budget", "revenue", "cost", "spending", "profit", "pricing", "forecast", "invoice"],
    ),
    (
        "marketing",
        &["marketing", "campaign", "brand", "launch", "promotion", "audience", "outreach"],
    ),
    (
        "product",
        &["product", "feature", "release", "design", "onboarding", "bug", "ship", "prototype"],
    ),
    (
        "people",
        &["team", "hire", "hiring", "staff", "headcount", "culture", "role", "manager"],
    ),
    (
        "metrics",
        &["metric", "kpi", "growth", "churn", "retention", "conversion", "engagement"],
    ),
];

pub struct QueryExpander {
    config: ExpansionConfig,
}

impl QueryExpander {
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }

    /// Append synonyms for recognized terms to the query.
    ///
    /// Short queries with few significant terms pass through unchanged so
    /// precise lookups stay precise.
    pub fn expand(&self, query: &str) -> String {
        let terms = self.significant_terms(query);
        if query.chars().count() < self.config.min_query_chars
            && terms.len() <= self.config.short_term_limit
        {
            return query.to_string();
        }

        let query_lower = query.to_lowercase();
        let mut additions: Vec<&str> = Vec::new();
        for term in &terms {
            let Some((_, synonyms)) = SYNONYMS.iter().find(|(key, _)| key == term) else {
                continue;
            };
            for synonym in synonyms.iter().take(self.config.max_synonyms) {
                if !query_lower.contains(synonym) && !additions.contains(synonym) {
                    additions.push(synonym);
                }
            }
        }

        if additions.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, additions.join(" "))
        }
    }

    /// Split a long query into per-topic sub-queries.
    ///
    /// Keywords partition into the first matching category; buckets with at
    /// least two terms become sub-queries. The original query is always the
    /// first variant, and the total is capped.
    pub fn cluster(&self, query: &str) -> Vec<String> {
        let terms = self.significant_terms(query);
        let mut variants = vec![query.to_string()];
        if terms.len() < self.config.cluster_min_keywords {
            return variants;
        }

        let mut buckets: Vec<(&str, Vec<String>)> =
            CATEGORIES.iter().map(|(name, _)| (*name, Vec::new())).collect();
        for term in terms {
            let matched = CATEGORIES.iter().position(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|k| term.contains(k) || k.contains(term.as_str()))
            });
            if let Some(idx) = matched {
                buckets[idx].1.push(term);
            }
        }

        for (_, bucket) in buckets {
            if variants.len() >= self.config.max_variants {
                break;
            }
            if bucket.len() >= 2 {
                variants.push(bucket.join(" "));
            }
        }
        variants
    }

    /// Expanded original plus topical sub-queries, capped at the variant limit.
    pub fn variants(&self, query: &str) -> Vec<String> {
        let mut out = vec![self.expand(query)];
        for variant in self.cluster(query).into_iter().skip(1) {
            if out.len() >= self.config.max_variants {
                break;
            }
            out.push(variant);
        }
        out
    }

    /// Lowercased alphanumeric tokens, minus stop words and short fragments,
    /// deduplicated in first-seen order.
    pub fn significant_terms(&self, text: &str) -> Vec<String> {
        significant_terms(text)
    }
}

/// Shared tokenizer used by expansion, scoring, and thread detection.
pub fn significant_terms(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        let term = token.to_lowercase();
        if term.len() < 3 || STOP_WORDS.contains(&term.as_str()) {
            continue;
        }
        if !seen.contains(&term) {
            seen.push(term);
        }
    }
    seen
}
