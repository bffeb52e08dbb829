//! Conversation thread detection: keyword-overlap clustering over recent
//! message memories.
//!
//! A thread is evidence that the current query continues an ongoing exchange
//! rather than opening a new topic. Matching is incremental: the keyword set
//! starts from the query and absorbs each matching message's terms, so a
//! drifting conversation can still hold together through intermediate
//! messages.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ThreadsConfig;
use crate::memory::expand::significant_terms;
use crate::memory::types::{Importance, MemoryEntry, MemoryKind};

/// Topics that always mark a thread as high importance.
const HIGH_STAKES: &[&str] = &[
    "mission",
    "strategy",
    "strategic",
    "budget",
    "roadmap",
    "revenue",
    "acquisition",
    "merger",
    "funding",
    "layoffs",
    "pricing",
    "partnership",
    "compliance",
    "incident",
];

/// A detected conversation thread.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationThread {
    /// Stable id derived from the top keywords; the same topic reproduces it.
    pub id: String,
    /// Most frequent keywords, highest first.
    pub keywords: Vec<String>,
    /// Ids of the messages that matched, in the order given.
    pub memory_ids: Vec<String>,
    pub message_count: usize,
    pub importance: Importance,
}

pub struct ThreadIdentifier {
    config: ThreadsConfig,
}

impl ThreadIdentifier {
    pub fn new(config: ThreadsConfig) -> Self {
        Self { config }
    }

    /// Detect whether `query` continues a thread across `recent` memories.
    ///
    /// Only message-kind entries participate. Iterate them in the order given
    /// (chronological works best); a message joins when its terms overlap the
    /// query or the accumulated thread set, and its terms then widen the set.
    /// Returns `None` below the minimum match count.
    pub fn identify(&self, query: &str, recent: &[MemoryEntry]) -> Option<ConversationThread> {
        let query_terms: HashSet<String> = significant_terms(query).into_iter().collect();
        if query_terms.is_empty() {
            return None;
        }

        let mut thread_terms = query_terms.clone();
        let mut frequency: HashMap<String, u32> = HashMap::new();
        let mut memory_ids = Vec::new();

        for entry in recent {
            if entry.kind != MemoryKind::Message {
                continue;
            }
            let terms: HashSet<String> = significant_terms(&entry.content).into_iter().collect();
            if terms.is_empty() {
                continue;
            }

            let vs_query = overlap(&terms, &query_terms);
            let vs_thread = overlap(&terms, &thread_terms);
            if vs_query < self.config.query_overlap && vs_thread < self.config.thread_overlap {
                continue;
            }

            for term in &terms {
                *frequency.entry(term.clone()).or_default() += 1;
                thread_terms.insert(term.clone());
            }
            memory_ids.push(entry.id.clone());
        }

        if memory_ids.len() < self.config.min_messages {
            return None;
        }

        let keywords = self.top_keywords(&frequency);
        let importance = self.thread_importance(memory_ids.len(), &thread_terms);
        let id = thread_id(&keywords);
        debug!(
            thread = %id,
            messages = memory_ids.len(),
            importance = %importance,
            "conversation thread detected"
        );

        Some(ConversationThread {
            id,
            keywords,
            message_count: memory_ids.len(),
            memory_ids,
            importance,
        })
    }

    /// Most frequent thread terms, ties broken alphabetically.
    fn top_keywords(&self, frequency: &HashMap<String, u32>) -> Vec<String> {
        let mut ranked: Vec<(&String, &u32)> = frequency.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(self.config.top_keywords)
            .map(|(term, _)| term.clone())
            .collect()
    }

    fn thread_importance(&self, matches: usize, terms: &HashSet<String>) -> Importance {
        if terms.iter().any(|t| HIGH_STAKES.contains(&t.as_str())) {
            return Importance::High;
        }
        if matches >= self.config.high_at {
            Importance::High
        } else if matches <= self.config.low_at {
            Importance::Low
        } else {
            Importance::Medium
        }
    }
}

/// Overlap coefficient: shared terms over the smaller set.
fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / a.len().min(b.len()) as f64
}

/// Hash the sorted top keywords so the same topic yields the same id.
fn thread_id(keywords: &[String]) -> String {
    let mut sorted: Vec<&str> = keywords.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(sorted.join("|").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("thread-{}", &digest[..12])
}
