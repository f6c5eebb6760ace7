use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome severity of a doubt inspection, lowest to highest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoubtLevel {
    /// Flavor text. Never alters signal or confidence.
    WisdomDrop,
    /// Market stress remark. Alters reasoning only.
    CautionNudge,
    /// Consensus too strong to trust: defer and dilute.
    DivineDoubt,
    /// Consensus too weak to act on: block position-taking.
    Veto,
}

impl DoubtLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WisdomDrop => "WISDOM_DROP",
            Self::CautionNudge => "CAUTION_NUDGE",
            Self::DivineDoubt => "DIVINE_DOUBT",
            Self::Veto => "VETO",
        }
    }

    /// Whether this level changes the consensus outcome.
    pub fn overrides_consensus(self) -> bool {
        matches!(self, Self::DivineDoubt | Self::Veto)
    }
}

/// An append-only record of a doubt inspection that fired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoubtEvent {
    /// What triggered the inspection (usually the debate subject).
    pub origin: String,
    pub message: String,
    pub level: DoubtLevel,
    pub timestamp: DateTime<Utc>,
}

impl DoubtEvent {
    pub fn new(origin: &str, level: DoubtLevel, message: String) -> Self {
        Self {
            origin: origin.to_string(),
            message,
            level,
            timestamp: Utc::now(),
        }
    }
}
