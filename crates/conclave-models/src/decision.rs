use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Personality;
use crate::context::MarketContext;
use crate::vote::Signal;

pub const DECISION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// BUY or SELL.
    TakePosition,
    Hold,
    /// Consensus was suspiciously total; wait for more information.
    Defer,
    /// Position-taking is blocked.
    Defensive,
}

impl DecisionType {
    pub fn from_signal(signal: Signal) -> Self {
        match signal {
            Signal::Buy | Signal::Sell => Self::TakePosition,
            Signal::Hold => Self::Hold,
            Signal::Defer => Self::Defer,
            Signal::Reject => Self::Defensive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TakePosition => "take_position",
            Self::Hold => "hold",
            Self::Defer => "defer",
            Self::Defensive => "defensive",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedImpact {
    High,
    Medium,
    Low,
}

impl ExpectedImpact {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.7 {
            Self::High
        } else if confidence >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// The raw arithmetic behind a decision's confidence, kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfidenceBreakdown {
    pub personality: Personality,
    pub memory_boost: f64,
    pub volatility_penalty: f64,
    /// clamp(0.1, 1.0, factor x 0.5 + memory_boost - volatility_penalty).
    pub base: f64,
    /// Consensus strength after any doubt override.
    pub consensus: f64,
    /// executive_weight x base + (1 - executive_weight) x consensus.
    pub blended: f64,
    pub veto_penalty_applied: bool,
    pub final_confidence: f64,
}

/// One arbitrated decision. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub id: Uuid,
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    pub decision_type: DecisionType,
    pub signal: Signal,
    /// Snapshot of the inbound context.
    pub context: MarketContext,
    pub reasoning: String,
    /// 0.0 to 1.0, rounded to four places.
    pub confidence: Decimal,
    pub breakdown: ConfidenceBreakdown,
    pub expected_impact: ExpectedImpact,
    /// Markers such as `doubt:veto` or `override:contrarian=BUY`.
    pub overrides: Vec<String>,
    /// Memory items recalled while deciding.
    pub memory_references: Vec<Uuid>,
    /// Debate session the consensus came from. Nil for fallback decisions.
    pub session_id: Uuid,
}

/// Convert an f64 confidence to the outbound decimal form.
pub fn confidence_decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value.clamp(0.0, 1.0))
        .map(|d| d.round_dp(4))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decision_type_follows_signal() {
        assert_eq!(DecisionType::from_signal(Signal::Buy), DecisionType::TakePosition);
        assert_eq!(DecisionType::from_signal(Signal::Sell), DecisionType::TakePosition);
        assert_eq!(DecisionType::from_signal(Signal::Defer), DecisionType::Defer);
        assert_eq!(DecisionType::from_signal(Signal::Reject), DecisionType::Defensive);
        assert_eq!(DecisionType::from_signal(Signal::Hold), DecisionType::Hold);
    }

    #[test]
    fn impact_buckets() {
        assert_eq!(ExpectedImpact::from_confidence(0.7), ExpectedImpact::High);
        assert_eq!(ExpectedImpact::from_confidence(0.55), ExpectedImpact::Medium);
        assert_eq!(ExpectedImpact::from_confidence(0.1), ExpectedImpact::Low);
    }

    #[test]
    fn confidence_rounds_to_four_places() {
        assert_eq!(confidence_decimal(0.7 * 0.6 + 0.3 * 0.8), dec!(0.66));
        assert_eq!(confidence_decimal(1.4), dec!(1));
        assert_eq!(confidence_decimal(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn decision_roundtrip() {
        let decision = Decision {
            id: Uuid::new_v4(),
            schema_version: DECISION_SCHEMA_VERSION,
            timestamp: Utc::now(),
            subject: "AAPL".to_string(),
            decision_type: DecisionType::TakePosition,
            signal: Signal::Buy,
            context: MarketContext::new("AAPL").with_trend("bullish"),
            reasoning: "Board consensus: BUY".to_string(),
            confidence: dec!(0.66),
            breakdown: ConfidenceBreakdown {
                personality: Personality::Balanced,
                memory_boost: 0.12,
                volatility_penalty: 0.02,
                base: 0.6,
                consensus: 0.8,
                blended: 0.66,
                veto_penalty_applied: false,
                final_confidence: 0.66,
            },
            expected_impact: ExpectedImpact::Medium,
            overrides: vec!["override:contrarian=BUY".to_string()],
            memory_references: vec![Uuid::new_v4()],
            session_id: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&decision).unwrap();
        let parsed: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, parsed);
        assert!(json.contains("\"confidence\":\"0.66\""));
    }
}
