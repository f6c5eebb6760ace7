//! Retention and merge planning for the decision memory.
//!
//! Planning is pure: it reads a snapshot of items and returns what to delete
//! and what to insert. The store applies the plan to the journal and to the
//! in-memory log under one write lock.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use conclave_models::{MemoryConfig, MemoryItem};
use serde::Serialize;
use uuid::Uuid;

/// Statistics from one compaction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactionStats {
    pub processed: usize,
    /// Items dropped for exceeding retention.
    pub expired: usize,
    /// Original items folded into merged items.
    pub merged: usize,
    /// Merged items created.
    pub groups: usize,
    pub remaining: usize,
}

impl CompactionStats {
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.merged == 0
    }

    pub fn summary(&self) -> String {
        if self.is_empty() {
            format!("Nothing to compact ({} items)", self.processed)
        } else {
            format!(
                "Processed: {}, Expired: {}, Merged: {} into {}, Remaining: {}",
                self.processed, self.expired, self.merged, self.groups, self.remaining
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompactionPlan {
    pub removed: Vec<Uuid>,
    pub inserted: Vec<MemoryItem>,
    pub stats: CompactionStats,
}

impl CompactionPlan {
    /// Apply the plan to an in-memory log, keeping it chronological.
    pub fn apply(&self, items: &mut Vec<MemoryItem>) {
        let removed: HashSet<Uuid> = self.removed.iter().copied().collect();
        items.retain(|item| !removed.contains(&item.id));
        items.extend(self.inserted.iter().cloned());
        items.sort_by_key(|item| item.timestamp);
    }
}

pub fn plan_compaction(
    items: &[MemoryItem],
    config: &MemoryConfig,
    now: DateTime<Utc>,
) -> CompactionPlan {
    let retention = Duration::days(i64::from(config.retention_days));
    let window = Duration::hours(i64::from(config.compaction_window_hours));

    let mut plan = CompactionPlan::default();
    plan.stats.processed = items.len();

    let mut groups: BTreeMap<(&'static str, &BTreeSet<String>), Vec<&MemoryItem>> =
        BTreeMap::new();
    for item in items {
        if now - item.timestamp > retention {
            plan.removed.push(item.id);
            plan.stats.expired += 1;
        } else if item.importance < config.compaction_importance_threshold {
            groups
                .entry((item.kind.as_str(), &item.tags))
                .or_default()
                .push(item);
        }
    }

    for mut group in groups.into_values() {
        group.sort_by_key(|item| item.timestamp);
        for cluster in cluster_by_window(&group, window) {
            if cluster.len() < 2 {
                continue;
            }
            plan.removed.extend(cluster.iter().map(|item| item.id));
            plan.stats.merged += cluster.len();
            plan.stats.groups += 1;
            plan.inserted.push(merge_items(cluster));
        }
    }

    plan.stats.remaining = items.len() - plan.removed.len() + plan.inserted.len();
    plan
}

/// Split a chronologically sorted group into runs no wider than `window`,
/// measured from each run's first item.
fn cluster_by_window<'a>(group: &[&'a MemoryItem], window: Duration) -> Vec<Vec<&'a MemoryItem>> {
    let mut clusters: Vec<Vec<&MemoryItem>> = Vec::new();
    for &item in group {
        match clusters.last_mut() {
            Some(run) if item.timestamp - run[0].timestamp <= window => run.push(item),
            _ => clusters.push(vec![item]),
        }
    }
    clusters
}

/// Fold a run into one item: contents concatenated, newest timestamp and
/// owner, highest importance.
fn merge_items(cluster: Vec<&MemoryItem>) -> MemoryItem {
    let newest = cluster[cluster.len() - 1];

    let mut content = Vec::new();
    for item in &cluster {
        match &item.content {
            serde_json::Value::Array(parts) => content.extend(parts.iter().cloned()),
            other => content.push(other.clone()),
        }
    }

    MemoryItem {
        id: Uuid::new_v4(),
        kind: newest.kind,
        content: serde_json::Value::Array(content),
        tags: newest.tags.clone(),
        timestamp: newest.timestamp,
        owner_id: newest.owner_id,
        importance: cluster
            .iter()
            .map(|item| item.importance)
            .fold(0.0, f64::max),
        merged_count: cluster.iter().map(|item| item.merged_count.max(1)).sum(),
    }
}
