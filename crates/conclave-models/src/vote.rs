use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;

/// A discrete vote. Variants are declared in lexical order of their labels,
/// so the derived `Ord` matches `as_str` ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    /// Neutral "wait and see" substituted by a divine doubt override.
    Defer,
    Hold,
    /// Hard block on position-taking.
    Reject,
    Sell,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Defer => "DEFER",
            Self::Hold => "HOLD",
            Self::Reject => "REJECT",
            Self::Sell => "SELL",
        }
    }

    /// BUY and SELL open or close exposure; everything else stands pat.
    pub fn takes_position(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cast vote. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub agent: String,
    pub signal: Signal,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub reasoning: String,
    /// Agent base weight x confidence. Zero for abstentions.
    pub weight: f64,
    /// The signal the agent would have cast had the context not forced
    /// another one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridden_from: Option<Signal>,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(agent: &Agent, signal: Signal, confidence: f64, reasoning: String) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            agent: agent.name.clone(),
            signal,
            confidence,
            reasoning,
            weight: agent.base_weight * confidence,
            overridden_from: None,
            cast_at: Utc::now(),
        }
    }

    /// Neutral HOLD with zero contribution, used when an agent cannot vote.
    pub fn abstain(agent: &str, reasoning: String) -> Self {
        Self {
            agent: agent.to_string(),
            signal: Signal::Hold,
            confidence: 0.0,
            reasoning,
            weight: 0.0,
            overridden_from: None,
            cast_at: Utc::now(),
        }
    }

    /// Mark this vote as forced away from `original`.
    pub fn overriding(mut self, original: Signal) -> Self {
        self.overridden_from = Some(original);
        self
    }

    pub fn is_abstention(&self) -> bool {
        self.weight <= 0.0
    }
}
