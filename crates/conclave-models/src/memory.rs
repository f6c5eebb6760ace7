use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::Decision;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Decision,
    Performance,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Performance => "performance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "decision" => Some(Self::Decision),
            "performance" => Some(Self::Performance),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the decision memory log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryItem {
    pub id: Uuid,
    pub kind: MemoryKind,
    /// Snapshot of the owning decision or evaluation. A JSON array once
    /// compaction has merged several items.
    pub content: serde_json::Value,
    pub tags: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
    /// Decision or evaluation id this item was derived from.
    pub owner_id: Uuid,
    /// 0.0 to 1.0. Decision confidence, or outcome magnitude for evaluations.
    pub importance: f64,
    /// Number of original items folded into this one.
    pub merged_count: u32,
}

/// After-the-fact evaluation of how a decision played out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceEvaluation {
    pub id: Uuid,
    pub decision_id: Uuid,
    /// Realized return as a fraction (0.04 = +4%).
    pub outcome: f64,
    pub notes: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl PerformanceEvaluation {
    pub fn new(decision_id: Uuid, outcome: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            decision_id,
            outcome,
            notes: None,
            evaluated_at: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn outcome_label(&self) -> &'static str {
        if self.outcome > 0.0 {
            "win"
        } else if self.outcome < 0.0 {
            "loss"
        } else {
            "flat"
        }
    }
}

/// Anything the decision memory accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryRecord {
    Decision(Decision),
    Evaluation(PerformanceEvaluation),
}

impl From<Decision> for MemoryRecord {
    fn from(decision: Decision) -> Self {
        Self::Decision(decision)
    }
}

impl From<PerformanceEvaluation> for MemoryRecord {
    fn from(evaluation: PerformanceEvaluation) -> Self {
        Self::Evaluation(evaluation)
    }
}
