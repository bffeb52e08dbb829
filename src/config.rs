use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::error::MemoryError;
use crate::memory::types::MemoryKind;

/// Engine-wide tuning knobs.
///
/// Every scoring weight and threshold the engine uses lives here; none are
/// hard-coded at call sites. Defaults are the tuning values the engine ships
/// with, overridable per section via TOML or `MNEMO_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub graph: GraphConfig,
    pub decay: DecayConfig,
    pub relevance: RelevanceConfig,
    pub consolidation: ConsolidationConfig,
    pub expansion: ExpansionConfig,
    pub threads: ThreadsConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    /// Default result cap for node search.
    pub find_limit: usize,
    /// Keyword-overlap threshold linking two mirrored memories.
    pub mirror_similarity: f64,
    /// Keyword-overlap threshold linking a mirrored memory to a task goal.
    pub task_overlap: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DecayConfig {
    pub base_rate: f64,
    /// Days without access before decay starts.
    pub decay_start_days: u64,
    pub min_rate: f64,
    pub max_rate: f64,
    /// Rate above which importance steps down one level.
    pub importance_step_threshold: f64,
    pub message_multiplier: f64,
    pub thought_multiplier: f64,
    pub fact_multiplier: f64,
    pub knowledge_multiplier: f64,
}

impl DecayConfig {
    /// Per-kind rate multiplier. Documents are exempt and multiply to zero.
    pub fn kind_multiplier(&self, kind: MemoryKind) -> f64 {
        match kind {
            MemoryKind::Message => self.message_multiplier,
            MemoryKind::Thought => self.thought_multiplier,
            MemoryKind::Fact => self.fact_multiplier,
            MemoryKind::Knowledge => self.knowledge_multiplier,
            MemoryKind::Document => 0.0,
        }
    }

    /// Reject a rate band `f64::clamp` would panic on: inverted or NaN bounds.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.min_rate.is_nan() || self.max_rate.is_nan() || self.min_rate > self.max_rate {
            return Err(MemoryError::validation(
                "decay.min_rate",
                format!(
                    "rate band {}..{} must satisfy min <= max",
                    self.min_rate, self.max_rate
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RelevanceConfig {
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    pub critical_boost: f64,
    pub high_boost: f64,
    /// Boost for content with headings or numbered lists.
    pub structure_boost: f64,
    pub min_relevance_score: f64,
    pub default_limit: usize,
    /// Per-repeat keyword bonus, and its cap.
    pub repeat_bonus: f64,
    pub repeat_bonus_cap: f64,
    /// Share of best-memory slots reserved for critical/high entries.
    pub priority_share: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// How many recent memories a pass considers.
    pub window: usize,
    /// Below this many candidates the pass is skipped.
    pub min_window: usize,
    /// Pairwise similarity above which memories group.
    pub similarity_threshold: f64,
    /// Prune rule: fewer accesses than this…
    pub prune_min_access: u32,
    /// …and untouched for more than this many days, at low importance.
    pub prune_idle_days: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Synonyms appended per matched term, at most.
    pub max_synonyms: usize,
    /// Queries shorter than this with few significant terms pass unchanged.
    pub min_query_chars: usize,
    /// Significant-term count at or below which a short query passes unchanged.
    pub short_term_limit: usize,
    /// Minimum significant keywords before topical clustering applies.
    pub cluster_min_keywords: usize,
    /// Sub-queries produced by clustering, at most (original query included).
    pub max_variants: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThreadsConfig {
    /// Term-overlap threshold against the original query.
    pub query_overlap: f64,
    /// Term-overlap threshold against the growing thread set.
    pub thread_overlap: f64,
    /// Messages required to confirm a thread.
    pub min_messages: usize,
    /// Matched-message count at which importance is raised to high.
    pub high_at: usize,
    /// Matched-message count at or below which importance drops to low.
    pub low_at: usize,
    /// Keywords hashed into the stable thread id.
    pub top_keywords: usize,
    /// Message-kind entries scanned per identification, newest backwards.
    pub recent_messages: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JournalConfig {
    /// Entries retained in the in-memory audit ring.
    pub capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            decay: DecayConfig::default(),
            relevance: RelevanceConfig::default(),
            consolidation: ConsolidationConfig::default(),
            expansion: ExpansionConfig::default(),
            threads: ThreadsConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            find_limit: 10,
            mirror_similarity: 0.3,
            task_overlap: 0.25,
        }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.1,
            decay_start_days: 7,
            min_rate: 0.01,
            max_rate: 0.5,
            importance_step_threshold: 0.3,
            message_multiplier: 2.5,
            thought_multiplier: 1.5,
            fact_multiplier: 0.7,
            knowledge_multiplier: 0.4,
        }
    }
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            critical_boost: 1.25,
            high_boost: 1.15,
            structure_boost: 1.1,
            min_relevance_score: 0.3,
            default_limit: 10,
            repeat_bonus: 0.05,
            repeat_bonus_cap: 0.2,
            priority_share: 0.34,
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            window: 20,
            min_window: 5,
            similarity_threshold: 0.7,
            prune_min_access: 3,
            prune_idle_days: 7,
        }
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_synonyms: 3,
            min_query_chars: 20,
            short_term_limit: 2,
            cluster_min_keywords: 4,
            max_variants: 4,
        }
    }
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            query_overlap: 0.3,
            thread_overlap: 0.25,
            min_messages: 2,
            high_at: 5,
            low_at: 2,
            top_keywords: 5,
            recent_messages: 20,
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl EngineConfig {
    /// Load from a TOML file (if it exists), apply env var overrides, then
    /// validate cross-field invariants.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EngineConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks per-field parsing cannot express.
    pub fn validate(&self) -> Result<(), MemoryError> {
        self.decay.validate()
    }

    /// Apply environment variable overrides
    /// (MNEMO_MIN_RELEVANCE, MNEMO_DECAY_BASE_RATE, MNEMO_JOURNAL_CAPACITY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMO_MIN_RELEVANCE") {
            if let Ok(parsed) = val.parse() {
                self.relevance.min_relevance_score = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_DECAY_BASE_RATE") {
            if let Ok(parsed) = val.parse() {
                self.decay.base_rate = parsed;
            }
        }
        if let Ok(val) = std::env::var("MNEMO_JOURNAL_CAPACITY") {
            if let Ok(parsed) = val.parse() {
                self.journal.capacity = parsed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.relevance.semantic_weight, 0.7);
        assert_eq!(config.relevance.keyword_weight, 0.3);
        assert_eq!(config.decay.decay_start_days, 7);
        assert_eq!(config.consolidation.similarity_threshold, 0.7);
        assert_eq!(config.threads.query_overlap, 0.3);
        assert!(config.decay.min_rate < config.decay.max_rate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[decay]
base_rate = 0.2
decay_start_days = 14

[relevance]
min_relevance_score = 0.5

[consolidation]
window = 50
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.decay.base_rate, 0.2);
        assert_eq!(config.decay.decay_start_days, 14);
        assert_eq!(config.relevance.min_relevance_score, 0.5);
        assert_eq!(config.consolidation.window, 50);
        // defaults still apply for unset fields
        assert_eq!(config.decay.max_rate, 0.5);
        assert_eq!(config.relevance.semantic_weight, 0.7);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = EngineConfig::default();
        std::env::set_var("MNEMO_MIN_RELEVANCE", "0.42");
        std::env::set_var("MNEMO_DECAY_BASE_RATE", "0.25");
        std::env::set_var("MNEMO_JOURNAL_CAPACITY", "64");

        config.apply_env_overrides();

        assert_eq!(config.relevance.min_relevance_score, 0.42);
        assert_eq!(config.decay.base_rate, 0.25);
        assert_eq!(config.journal.capacity, 64);

        // Clean up
        std::env::remove_var("MNEMO_MIN_RELEVANCE");
        std::env::remove_var("MNEMO_DECAY_BASE_RATE");
        std::env::remove_var("MNEMO_JOURNAL_CAPACITY");
    }

    #[test]
    fn document_kind_never_multiplies() {
        let decay = DecayConfig::default();
        assert_eq!(decay.kind_multiplier(MemoryKind::Document), 0.0);
        assert!(decay.kind_multiplier(MemoryKind::Message) > decay.kind_multiplier(MemoryKind::Fact));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(dir.path().join("absent.toml")).unwrap();
        // Only fields the env override block never touches; the override test
        // mutates process env and may run in parallel with this one.
        assert_eq!(config.decay.decay_start_days, 7);
        assert_eq!(config.consolidation.window, 20);
        assert_eq!(config.relevance.semantic_weight, 0.7);
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnemo.toml");
        std::fs::write(&path, "[expansion]\nmax_synonyms = 5\n").unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.expansion.max_synonyms, 5);
        assert_eq!(config.expansion.max_variants, 4);
    }

    #[test]
    fn load_rejects_inverted_decay_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnemo.toml");
        std::fs::write(&path, "[decay]\nmin_rate = 0.9\nmax_rate = 0.1\n").unwrap();

        let err = EngineConfig::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MemoryError>(),
            Some(MemoryError::Validation { .. })
        ));

        // NaN bounds would panic clamp just like an inverted band
        let nan_band = DecayConfig {
            min_rate: f64::NAN,
            ..Default::default()
        };
        assert!(nan_band.validate().is_err());
    }
}
