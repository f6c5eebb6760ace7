use std::collections::BTreeSet;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use conclave_models::{
    Decision, MarketContext, MemoryConfig, MemoryItem, MemoryKind, MemoryRecord,
    PerformanceEvaluation,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compaction::{plan_compaction, CompactionStats};
use crate::error::MemoryError;
use crate::journal::SqliteJournal;
use crate::relevance::relevance;
use crate::tagging;

/// Bounded log of past decisions and their evaluations.
///
/// Appends go to the journal first, then to the in-memory log under a write
/// lock, so a failed journal write leaves both untouched and readers never
/// see a partially stored item. The log is kept in timestamp order.
pub struct DecisionMemory {
    items: RwLock<Vec<MemoryItem>>,
    journal: Option<Mutex<SqliteJournal>>,
    config: MemoryConfig,
}

impl DecisionMemory {
    /// Process-local memory, lost on exit.
    pub fn in_memory(config: MemoryConfig) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            journal: None,
            config,
        }
    }

    /// Journal-backed memory when `sqlite_path` is set, process-local otherwise.
    pub fn open(config: MemoryConfig) -> Result<Self, MemoryError> {
        match config.sqlite_path.clone() {
            Some(path) => {
                let journal = SqliteJournal::open(&path)?;
                info!(path = %path, "Opened decision memory journal");
                Self::with_journal(config, journal)
            }
            None => Ok(Self::in_memory(config)),
        }
    }

    /// Wrap an already opened journal, loading its newest `max_items` items.
    pub fn with_journal(config: MemoryConfig, journal: SqliteJournal) -> Result<Self, MemoryError> {
        let items = journal.load_recent(config.max_items)?;
        debug!(count = items.len(), "Loaded memory items from journal");
        Ok(Self {
            items: RwLock::new(items),
            journal: Some(Mutex::new(journal)),
            config,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Append a decision or evaluation. Returns the new memory item's id.
    pub fn store(&self, record: impl Into<MemoryRecord>) -> Result<Uuid, MemoryError> {
        let mut items = self.write_items()?;

        let item = match record.into() {
            MemoryRecord::Decision(decision) => decision_item(&decision)?,
            MemoryRecord::Evaluation(evaluation) => {
                let judged = items
                    .iter()
                    .rev()
                    .find(|i| decision_snapshot(i, evaluation.decision_id).is_some())
                    .map(|i| &i.tags);
                if judged.is_none() {
                    debug!(decision_id = %evaluation.decision_id, "Evaluated decision not in memory");
                }
                evaluation_item(&evaluation, judged)?
            }
        };

        let evicted = if self.config.max_items > 0 && items.len() >= self.config.max_items {
            eviction_candidate(&items)
        } else {
            None
        };

        if let Some(journal) = &self.journal {
            let mut journal = journal
                .lock()
                .map_err(|e| MemoryError::Unavailable(format!("journal lock poisoned: {e}")))?;
            match evicted {
                Some(old) => journal.replace(&[old], std::slice::from_ref(&item))?,
                None => journal.append(&item)?,
            }
        }

        if let Some(old) = evicted {
            items.retain(|i| i.id != old);
            debug!(evicted = %old, "Memory at capacity, evicted least important item");
        }

        let id = item.id;
        let at = items.partition_point(|i| i.timestamp <= item.timestamp);
        debug!(id = %id, kind = %item.kind, tags = ?item.tags, "Stored memory item");
        items.insert(at, item);
        Ok(id)
    }

    /// Items relevant to `context`, best first.
    pub fn recall(
        &self,
        context: &MarketContext,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        self.recall_at(&tagging::context_tags(context), limit, Utc::now())
    }

    /// Items scoring above the relevance threshold against `query`, sorted by
    /// relevance then recency, truncated to `limit`.
    pub fn recall_at(
        &self,
        query: &BTreeSet<String>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        let items = self.read_items()?;

        let mut scored: Vec<(f64, &MemoryItem)> = items
            .iter()
            .map(|item| (relevance(&item.tags, query, item.timestamp, now), item))
            .filter(|(score, _)| *score > self.config.relevance_threshold)
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa).then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(_, item)| item.clone()).collect())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<MemoryItem>, MemoryError> {
        let items = self.read_items()?;
        Ok(items.iter().find(|item| item.id == id).cloned())
    }

    /// The stored decision with the given decision id, including decisions
    /// folded into a merged item.
    pub fn decision(&self, decision_id: Uuid) -> Result<Option<Decision>, MemoryError> {
        let items = self.read_items()?;
        match items.iter().rev().find_map(|item| decision_snapshot(item, decision_id)) {
            Some(snapshot) => Ok(Some(serde_json::from_value(snapshot.clone())?)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.read_items().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every item, oldest first.
    pub fn items(&self) -> Result<Vec<MemoryItem>, MemoryError> {
        Ok(self.read_items()?.clone())
    }

    /// Drop expired items and merge near-duplicate low-importance ones.
    ///
    /// Runs under the write lock; stores wait for it to finish.
    pub fn compact(&self, now: DateTime<Utc>) -> Result<CompactionStats, MemoryError> {
        let mut items = self.write_items()?;
        let plan = plan_compaction(&items, &self.config, now);
        if plan.removed.is_empty() && plan.inserted.is_empty() {
            return Ok(plan.stats);
        }

        if let Some(journal) = &self.journal {
            let mut journal = journal
                .lock()
                .map_err(|e| MemoryError::Unavailable(format!("journal lock poisoned: {e}")))?;
            journal.replace(&plan.removed, &plan.inserted)?;
        }
        plan.apply(&mut items);

        info!(
            expired = plan.stats.expired,
            merged = plan.stats.merged,
            remaining = plan.stats.remaining,
            "Memory compacted"
        );
        Ok(plan.stats)
    }

    fn read_items(&self) -> Result<RwLockReadGuard<'_, Vec<MemoryItem>>, MemoryError> {
        self.items
            .read()
            .map_err(|e| MemoryError::Unavailable(format!("memory lock poisoned: {e}")))
    }

    fn write_items(&self) -> Result<RwLockWriteGuard<'_, Vec<MemoryItem>>, MemoryError> {
        self.items.write().map_err(|e| {
            warn!("Memory lock poisoned");
            MemoryError::Unavailable(format!("memory lock poisoned: {e}"))
        })
    }
}

fn decision_item(decision: &Decision) -> Result<MemoryItem, MemoryError> {
    Ok(MemoryItem {
        id: Uuid::new_v4(),
        kind: MemoryKind::Decision,
        content: serde_json::to_value(decision)?,
        tags: tagging::decision_tags(decision),
        timestamp: decision.timestamp,
        owner_id: decision.id,
        importance: decision.breakdown.final_confidence.clamp(0.0, 1.0),
        merged_count: 1,
    })
}

/// A 10% move, either way, is maximally important.
fn evaluation_item(
    evaluation: &PerformanceEvaluation,
    judged: Option<&BTreeSet<String>>,
) -> Result<MemoryItem, MemoryError> {
    let importance = if evaluation.outcome.is_finite() {
        (evaluation.outcome.abs() * 10.0).min(1.0)
    } else {
        0.0
    };
    Ok(MemoryItem {
        id: Uuid::new_v4(),
        kind: MemoryKind::Performance,
        content: serde_json::to_value(evaluation)?,
        tags: tagging::evaluation_tags(judged, evaluation),
        timestamp: evaluation.evaluated_at,
        owner_id: evaluation.id,
        importance,
        merged_count: 1,
    })
}

/// Lowest importance first, oldest among equals.
/// The snapshot of `decision_id` held by `item`, whether the item is that
/// decision or a merged item that folded it in.
fn decision_snapshot(item: &MemoryItem, decision_id: Uuid) -> Option<&serde_json::Value> {
    if item.kind != MemoryKind::Decision {
        return None;
    }
    match &item.content {
        serde_json::Value::Array(parts) => {
            let wanted = decision_id.to_string();
            parts
                .iter()
                .find(|part| part.get("id").and_then(|v| v.as_str()) == Some(wanted.as_str()))
        }
        single if item.owner_id == decision_id => Some(single),
        _ => None,
    }
}

fn eviction_candidate(items: &[MemoryItem]) -> Option<Uuid> {
    items
        .iter()
        .min_by(|a, b| {
            a.importance
                .total_cmp(&b.importance)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        })
        .map(|item| item.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use conclave_models::{
        confidence_decimal, ConfidenceBreakdown, DecisionType, ExpectedImpact, Signal,
        DECISION_SCHEMA_VERSION,
    };

    fn decision(trend: &str, volatility: f64, confidence: f64, age: Duration) -> Decision {
        let context = MarketContext::new("AAPL")
            .with_trend(trend)
            .with_volatility(volatility);
        Decision {
            id: Uuid::new_v4(),
            schema_version: DECISION_SCHEMA_VERSION,
            timestamp: Utc::now() - age,
            subject: "AAPL".to_string(),
            decision_type: DecisionType::TakePosition,
            signal: Signal::Buy,
            context,
            reasoning: "test".to_string(),
            confidence: confidence_decimal(confidence),
            breakdown: ConfidenceBreakdown {
                final_confidence: confidence,
                ..Default::default()
            },
            expected_impact: ExpectedImpact::from_confidence(confidence),
            overrides: vec![],
            memory_references: vec![],
            session_id: Uuid::new_v4(),
        }
    }

    fn query(trend: &str, volatility: f64) -> BTreeSet<String> {
        tagging::context_tags(&MarketContext::new("X").with_trend(trend).with_volatility(volatility))
    }

    #[test]
    fn store_and_get() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        let d = decision("bullish", 0.1, 0.8, Duration::zero());
        let id = memory.store(d.clone()).unwrap();

        let item = memory.get(id).unwrap().unwrap();
        assert_eq!(item.owner_id, d.id);
        assert!(item.tags.contains("type:take_position"));
        assert_eq!(memory.decision(d.id).unwrap(), Some(d));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn recall_filters_by_relevance() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        memory.store(decision("bullish", 0.1, 0.8, Duration::days(1))).unwrap();
        // Different trend and volatility, and old enough that recency alone
        // cannot carry it over the threshold.
        memory.store(decision("bearish", 0.7, 0.8, Duration::days(30))).unwrap();

        let recalled = memory
            .recall_at(&query("bullish", 0.1), 5, Utc::now())
            .unwrap();
        assert_eq!(recalled.len(), 1);
        assert!(recalled[0].tags.contains("trend:bullish"));
    }

    #[test]
    fn same_tags_newer_ranks_first() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        let old = memory.store(decision("bullish", 0.1, 0.8, Duration::days(100))).unwrap();
        let new = memory.store(decision("bullish", 0.1, 0.8, Duration::days(2))).unwrap();

        let recalled = memory
            .recall_at(&query("bullish", 0.1), 5, Utc::now())
            .unwrap();
        let ids: Vec<Uuid> = recalled.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![new, old]);
    }

    #[test]
    fn recall_truncates_to_limit() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        for day in 0..8 {
            memory.store(decision("neutral", 0.3, 0.6, Duration::days(day))).unwrap();
        }
        let recalled = memory.recall(&MarketContext::new("AAPL").with_volatility(0.3), 5).unwrap();
        assert_eq!(recalled.len(), 5);
        assert!(recalled.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn evaluation_inherits_decision_tags() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        let d = decision("bearish", 0.6, 0.7, Duration::zero());
        memory.store(d.clone()).unwrap();

        let eval_id = memory
            .store(PerformanceEvaluation::new(d.id, -0.03))
            .unwrap();
        let item = memory.get(eval_id).unwrap().unwrap();
        assert_eq!(item.kind, MemoryKind::Performance);
        assert!(item.tags.contains("trend:bearish"));
        assert!(item.tags.contains("vol:high"));
        assert!(item.tags.contains("outcome:loss"));
        assert!(item.tags.contains("type:performance"));
        assert!(!item.tags.contains("type:take_position"));
        assert!((item.importance - 0.3).abs() < 1e-9);
    }

    #[test]
    fn capacity_evicts_least_important() {
        let config = MemoryConfig {
            max_items: 2,
            ..Default::default()
        };
        let memory = DecisionMemory::in_memory(config);
        let weak = memory.store(decision("bullish", 0.1, 0.2, Duration::days(1))).unwrap();
        let strong = memory.store(decision("bullish", 0.1, 0.9, Duration::days(2))).unwrap();
        let third = memory.store(decision("bullish", 0.1, 0.5, Duration::zero())).unwrap();

        assert_eq!(memory.len(), 2);
        assert!(memory.get(weak).unwrap().is_none());
        assert!(memory.get(strong).unwrap().is_some());
        assert!(memory.get(third).unwrap().is_some());
    }

    #[test]
    fn items_stay_chronological() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        memory.store(decision("bullish", 0.1, 0.5, Duration::days(1))).unwrap();
        memory.store(decision("bullish", 0.1, 0.5, Duration::days(3))).unwrap();
        memory.store(decision("bullish", 0.1, 0.5, Duration::days(2))).unwrap();

        let items = memory.items().unwrap();
        assert!(items.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn compact_merges_and_keeps_decisions_reachable() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        let a = decision("neutral", 0.1, 0.2, Duration::hours(5));
        let b = decision("neutral", 0.1, 0.3, Duration::hours(3));
        memory.store(a.clone()).unwrap();
        memory.store(b.clone()).unwrap();
        memory.store(decision("bullish", 0.1, 0.9, Duration::hours(1))).unwrap();

        let stats = memory.compact(Utc::now()).unwrap();
        assert_eq!(stats.merged, 2);
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.decision(a.id).unwrap(), Some(a));
        assert_eq!(memory.decision(b.id).unwrap(), Some(b));
    }

    #[test]
    fn evaluation_of_merged_decision_inherits_its_tags() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        let a = decision("bearish", 0.7, 0.2, Duration::hours(4));
        let b = decision("bearish", 0.7, 0.2, Duration::hours(2));
        memory.store(a.clone()).unwrap();
        memory.store(b).unwrap();
        assert_eq!(memory.compact(Utc::now()).unwrap().merged, 2);

        // The merged item is owned by the newer decision; `a` only lives in its content.
        let eval_id = memory.store(PerformanceEvaluation::new(a.id, -0.05)).unwrap();
        let tags = memory.get(eval_id).unwrap().unwrap().tags;
        assert!(tags.contains("trend:bearish"));
        assert!(tags.contains("vol:high"));
        assert!(tags.contains("outcome:loss"));
        assert!(tags.contains("type:performance"));
    }

    #[test]
    fn recall_does_not_compact() {
        let memory = DecisionMemory::in_memory(MemoryConfig::default());
        memory.store(decision("neutral", 0.1, 0.1, Duration::hours(2))).unwrap();
        memory.store(decision("neutral", 0.1, 0.1, Duration::hours(1))).unwrap();

        memory.recall(&MarketContext::new("AAPL"), 5).unwrap();
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn journal_backed_store_survives_reload() {
        let memory =
            DecisionMemory::with_journal(MemoryConfig::default(), SqliteJournal::open_in_memory().unwrap())
                .unwrap();
        let d = decision("bullish", 0.1, 0.8, Duration::zero());
        memory.store(d).unwrap();

        let journal = memory.journal.as_ref().unwrap().lock().unwrap();
        assert_eq!(journal.count().unwrap(), 1);
        assert_eq!(journal.load_recent(10).unwrap(), memory.items().unwrap());
    }
}
