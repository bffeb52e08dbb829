//! Temporal decay: per-memory rate computation and importance step-down.
//!
//! [`DecayEngine`] is pure computation over [`MemoryEntry`] records; the batch
//! pass that persists results lives on the engine, which catches per-item
//! backend failures so one bad record never halts the run.
//!
//! Rate model: permanent exemption for critical/document entries, a grace
//! period after last access, then `base × kind × importance × access`,
//! clamped to the configured band. Importance steps down at most one level
//! per pass, only when the rate crosses the step threshold, with low as the
//! floor.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DecayConfig;
use crate::memory::types::{Importance, MemoryEntry};

/// Outcome of evaluating one memory.
#[derive(Debug, Clone, Copy)]
pub struct DecayAssessment {
    /// Decay rate, `0.0` for exempt or in-grace entries; otherwise within
    /// `[min_rate, max_rate]`.
    pub rate: f64,
    /// Importance after applying the step-down rule.
    pub new_importance: Importance,
    /// `true` for permanently exempt entries (critical flag, critical
    /// importance, or document kind).
    pub exempt: bool,
}

/// Aggregate statistics from one batch pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecayReport {
    pub processed: usize,
    /// Permanently exempt entries, counted but never touched.
    pub critical: usize,
    /// Entries updated with a positive rate.
    pub decayed: usize,
    /// Entries whose backend write failed; their cache state was reverted.
    pub errors: usize,
    /// Mean rate across decayed entries, `0.0` when none decayed.
    pub average_rate: f64,
}

/// Running aggregates exposed for observability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecayStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    pub runs: u64,
    pub total_decayed: u64,
}

pub struct DecayEngine {
    config: DecayConfig,
    stats: DecayStats,
}

impl DecayEngine {
    pub fn new(config: DecayConfig) -> Self {
        Self {
            config,
            stats: DecayStats::default(),
        }
    }

    /// Replace the decay configuration. Takes effect on the next calculation.
    pub fn reconfigure(&mut self, config: DecayConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Evaluate one memory against the decay model.
    pub fn calculate(&self, memory: &MemoryEntry) -> DecayAssessment {
        self.calculate_at(memory, Utc::now())
    }

    fn calculate_at(&self, memory: &MemoryEntry, now: DateTime<Utc>) -> DecayAssessment {
        // 1. Permanent exemptions
        if memory.decay_exempt() || memory.importance == Importance::Critical {
            return DecayAssessment {
                rate: 0.0,
                new_importance: memory.importance,
                exempt: true,
            };
        }

        // 2. Grace period since last touch
        let days_idle = (now - memory.last_touched()).num_seconds() as f64 / 86_400.0;
        if days_idle < self.config.decay_start_days as f64 {
            return DecayAssessment {
                rate: 0.0,
                new_importance: memory.importance,
                exempt: false,
            };
        }

        // 3. Multiplicative rate
        let access_multiplier = (1.0 - memory.meta.access_count as f64 * 0.1).max(0.5);
        let raw = self.config.base_rate
            * self.config.kind_multiplier(memory.kind)
            * importance_multiplier(memory.importance)
            * access_multiplier;

        // 4. Clamp to the configured band
        let rate = raw.clamp(self.config.min_rate, self.config.max_rate);

        // 5. Importance steps down one level past the threshold, low is a floor
        let new_importance = if rate > self.config.importance_step_threshold {
            memory.importance.step_down()
        } else {
            memory.importance
        };

        DecayAssessment {
            rate,
            new_importance,
            exempt: false,
        }
    }

    /// Fold a finished batch pass into the running stats.
    pub fn note_run(&mut self, report: &DecayReport) {
        self.stats.last_run = Some(Utc::now());
        self.stats.runs += 1;
        self.stats.total_decayed += report.decayed as u64;
    }

    pub fn stats(&self) -> DecayStats {
        self.stats.clone()
    }
}

/// Retention multiplier: important entries decay slower.
///
/// Critical is handled by the exemption gate before this is consulted.
fn importance_multiplier(importance: Importance) -> f64 {
    match importance {
        Importance::High => 0.5,
        Importance::Medium => 1.0,
        Importance::Low => 1.5,
        Importance::Critical => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryKind;
    use chrono::Duration;

    fn engine() -> DecayEngine {
        DecayEngine::new(DecayConfig::default())
    }

    /// An entry last touched `days_ago` days in the past.
    fn aged_entry(
        kind: MemoryKind,
        importance: Importance,
        access_count: u32,
        days_ago: i64,
    ) -> MemoryEntry {
        let mut entry = MemoryEntry::new("stored observation", kind, importance, "test");
        entry.meta.access_count = access_count;
        entry.meta.last_accessed = Some(Utc::now() - Duration::days(days_ago));
        entry
    }

    #[test]
    fn documents_never_decay() {
        let entry = aged_entry(MemoryKind::Document, Importance::Low, 0, 365);
        let assessment = engine().calculate(&entry);
        assert_eq!(assessment.rate, 0.0);
        assert!(assessment.exempt);
    }

    #[test]
    fn critical_flag_never_decays() {
        let mut entry = aged_entry(MemoryKind::Message, Importance::Low, 0, 365);
        entry.meta.critical = true;
        let assessment = engine().calculate(&entry);
        assert_eq!(assessment.rate, 0.0);
        assert!(assessment.exempt);
    }

    #[test]
    fn critical_importance_never_decays() {
        let entry = aged_entry(MemoryKind::Fact, Importance::Critical, 0, 365);
        let assessment = engine().calculate(&entry);
        assert_eq!(assessment.rate, 0.0);
        assert!(assessment.exempt);
    }

    #[test]
    fn grace_period_holds_rate_at_zero() {
        let entry = aged_entry(MemoryKind::Message, Importance::Low, 0, 3);
        let assessment = engine().calculate(&entry);
        assert_eq!(assessment.rate, 0.0);
        assert!(!assessment.exempt);
    }

    #[test]
    fn low_idle_memory_decays_within_band() {
        // importance low, never accessed, idle 10 days with a 7-day grace
        let entry = aged_entry(MemoryKind::Message, Importance::Low, 0, 10);
        let engine = engine();
        let assessment = engine.calculate(&entry);

        assert!(assessment.rate > 0.0);
        assert!(assessment.rate <= engine.config().max_rate);
        // 0.1 × 2.5 × 1.5 × 1.0 = 0.375 crosses the step threshold; low still floors
        assert!(assessment.rate > engine.config().importance_step_threshold);
        assert_eq!(assessment.new_importance, Importance::Low);
    }

    #[test]
    fn nonzero_rates_stay_clamped() {
        // Tiny base rate: knowledge, high importance, heavily accessed → min clamp
        let slow_engine = DecayEngine::new(DecayConfig {
            base_rate: 0.01,
            ..Default::default()
        });
        let slow = aged_entry(MemoryKind::Knowledge, Importance::High, 9, 30);
        let assessment = slow_engine.calculate(&slow);
        assert_eq!(assessment.rate, DecayConfig::default().min_rate);

        // Aggressive base rate → max clamp
        let fast_engine = DecayEngine::new(DecayConfig {
            base_rate: 1.0,
            ..Default::default()
        });
        let fast = aged_entry(MemoryKind::Message, Importance::Low, 0, 30);
        let assessment = fast_engine.calculate(&fast);
        assert_eq!(assessment.rate, DecayConfig::default().max_rate);
    }

    #[test]
    fn importance_steps_down_one_level_past_threshold() {
        // 0.15 × 2.5 × 1.0 × 1.0 = 0.375 > 0.3 step threshold
        let config = DecayConfig {
            base_rate: 0.15,
            ..Default::default()
        };
        let engine = DecayEngine::new(config);
        let entry = aged_entry(MemoryKind::Message, Importance::Medium, 0, 10);
        let assessment = engine.calculate(&entry);
        assert_eq!(assessment.new_importance, Importance::Low);

        // High with the same setup: 0.15 × 2.5 × 0.5 = 0.1875, under threshold
        let entry = aged_entry(MemoryKind::Message, Importance::High, 0, 10);
        let assessment = engine.calculate(&entry);
        assert_eq!(assessment.new_importance, Importance::High);
    }

    #[test]
    fn frequent_access_slows_decay_with_floor() {
        let engine = engine();
        let untouched = aged_entry(MemoryKind::Fact, Importance::Medium, 0, 10);
        let visited = aged_entry(MemoryKind::Fact, Importance::Medium, 3, 10);
        let heavily = aged_entry(MemoryKind::Fact, Importance::Medium, 20, 10);

        let r0 = engine.calculate(&untouched).rate;
        let r3 = engine.calculate(&visited).rate;
        let r20 = engine.calculate(&heavily).rate;

        assert!(r3 < r0);
        // Floor: 20 accesses multiply by 0.5, same as 5
        let r5 = engine.calculate(&aged_entry(MemoryKind::Fact, Importance::Medium, 5, 10)).rate;
        assert_eq!(r20, r5);
    }

    #[test]
    fn reconfigure_takes_effect() {
        let mut engine = engine();
        let entry = aged_entry(MemoryKind::Fact, Importance::Medium, 0, 10);
        let before = engine.calculate(&entry).rate;

        engine.reconfigure(DecayConfig {
            base_rate: 0.2,
            ..Default::default()
        });
        let after = engine.calculate(&entry).rate;
        assert!(after > before);
    }

    #[test]
    fn note_run_accumulates_stats() {
        let mut engine = engine();
        assert!(engine.stats().last_run.is_none());

        engine.note_run(&DecayReport {
            processed: 10,
            critical: 2,
            decayed: 5,
            errors: 0,
            average_rate: 0.2,
        });
        engine.note_run(&DecayReport {
            decayed: 3,
            ..Default::default()
        });

        let stats = engine.stats();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.total_decayed, 8);
        assert!(stats.last_run.is_some());
    }
}
