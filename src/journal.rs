//! Bounded operation journal.
//!
//! Every mutating engine operation records an entry here. The journal is a
//! ring: once capacity is reached the oldest entries fall off, so it answers
//! "what happened recently" rather than serving as a durable audit trail.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::JournalConfig;

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    /// Operation name, e.g. `create`, `decay`, `consolidate`.
    pub operation: String,
    /// Id of the affected memory or node, or a batch label.
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Journal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
}

impl Journal {
    pub fn new(config: &JournalConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity.min(1024)),
            capacity: config.capacity.max(1),
        }
    }

    pub fn record(
        &mut self,
        operation: &str,
        subject: &str,
        details: Option<serde_json::Value>,
    ) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(JournalEntry {
            operation: operation.to_string(),
            subject: subject.to_string(),
            details,
            created_at: Utc::now(),
        });
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&JournalEntry> {
        self.entries.iter().rev().take(limit).collect()
    }

    /// Entries touching one subject, newest first.
    pub fn for_subject(&self, subject: &str, limit: usize) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.subject == subject)
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
