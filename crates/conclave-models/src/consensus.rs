use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::doubt::{DoubtEvent, DoubtLevel};
use crate::vote::{Signal, Vote};

/// Aggregated outcome of one debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusResult {
    pub winning_signal: Signal,
    /// Winning weight / total weight, in [0, 1]. Zero when nobody voted.
    pub consensus_strength: f64,
    /// Per-signal share of the total weight.
    pub vote_distribution: BTreeMap<Signal, f64>,
    pub participant_count: usize,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub doubt_applied: bool,
}

impl ConsensusResult {
    /// The defined result for a debate with no valid votes.
    pub fn empty(session_id: Uuid) -> Self {
        Self {
            winning_signal: Signal::Hold,
            consensus_strength: 0.0,
            vote_distribution: BTreeMap::new(),
            participant_count: 0,
            session_id,
            timestamp: Utc::now(),
            doubt_applied: false,
        }
    }
}

/// A complete vote-gather-and-tally cycle for one subject. This is the unit
/// the debate cache memoizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Debate {
    pub subject: String,
    pub consensus: ConsensusResult,
    /// Winner of the tally before any doubt override.
    pub tallied_signal: Signal,
    /// Every vote cast, abstentions included, in agent registration order.
    pub votes: Vec<Vote>,
    pub doubt: Option<DoubtEvent>,
    /// Markers for context-forced persona signals.
    pub overrides: Vec<String>,
}

impl Debate {
    pub fn doubt_level(&self) -> Option<DoubtLevel> {
        self.doubt.as_ref().map(|event| event.level)
    }

    pub fn vetoed(&self) -> bool {
        self.doubt_level() == Some(DoubtLevel::Veto)
    }

    /// Votes that backed the tallied winner, heaviest first.
    pub fn supporting_votes(&self) -> Vec<&Vote> {
        let mut votes: Vec<&Vote> = self
            .votes
            .iter()
            .filter(|v| !v.is_abstention() && v.signal == self.tallied_signal)
            .collect();
        votes.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        votes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Role, SignalRule};

    fn debate_with(votes: Vec<Vote>, tallied: Signal) -> Debate {
        Debate {
            subject: "AAPL".to_string(),
            consensus: ConsensusResult::empty(Uuid::new_v4()),
            tallied_signal: tallied,
            votes,
            doubt: None,
            overrides: vec![],
        }
    }

    #[test]
    fn empty_consensus_defaults_to_hold() {
        let result = ConsensusResult::empty(Uuid::new_v4());
        assert_eq!(result.winning_signal, Signal::Hold);
        assert_eq!(result.consensus_strength, 0.0);
        assert_eq!(result.participant_count, 0);
        assert!(!result.doubt_applied);
    }

    #[test]
    fn distribution_serializes_with_signal_keys() {
        let mut result = ConsensusResult::empty(Uuid::new_v4());
        result.vote_distribution.insert(Signal::Buy, 0.75);
        result.vote_distribution.insert(Signal::Sell, 0.25);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["vote_distribution"]["BUY"], serde_json::json!(0.75));

        let parsed: ConsensusResult = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn supporting_votes_are_heaviest_first() {
        let analyst = Agent::new("analyst", "research", Role::Analyst, SignalRule::Value);
        let director = Agent::new("director", "strategy", Role::Director, SignalRule::Balanced);
        let seller = Agent::new("seller", "trading", Role::Senior, SignalRule::Momentum);
        let debate = debate_with(
            vec![
                Vote::new(&analyst, Signal::Buy, 0.9, "cheap".to_string()),
                Vote::new(&seller, Signal::Sell, 0.9, "weak".to_string()),
                Vote::new(&director, Signal::Buy, 0.6, "fine".to_string()),
                Vote::abstain("broken", "failed".to_string()),
            ],
            Signal::Buy,
        );

        let names: Vec<&str> = debate
            .supporting_votes()
            .iter()
            .map(|v| v.agent.as_str())
            .collect();
        assert_eq!(names, vec!["director", "analyst"]);
        assert!(!debate.vetoed());
    }
}
