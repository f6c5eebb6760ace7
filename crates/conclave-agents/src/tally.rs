use std::collections::BTreeMap;

use chrono::Utc;
use conclave_models::{ConsensusResult, Signal, TieBreak, Vote};
use uuid::Uuid;

/// Weights closer than this are treated as tied.
const TIE_EPSILON: f64 = 1e-9;

/// Accumulated support for one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalWeight {
    pub signal: Signal,
    pub weight: f64,
    /// Sum of voter confidences.
    pub confidence: f64,
    pub votes: usize,
}

/// Weighted votes grouped by signal, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    entries: Vec<SignalWeight>,
    total_weight: f64,
    participants: usize,
}

/// Accumulate votes. Zero-weight votes (abstentions) do not participate.
pub fn tally(votes: &[Vote]) -> Tally {
    let mut tally = Tally::default();
    for vote in votes.iter().filter(|v| v.weight > 0.0 && v.weight.is_finite()) {
        match tally.entries.iter_mut().find(|e| e.signal == vote.signal) {
            Some(entry) => {
                entry.weight += vote.weight;
                entry.confidence += vote.confidence;
                entry.votes += 1;
            }
            None => tally.entries.push(SignalWeight {
                signal: vote.signal,
                weight: vote.weight,
                confidence: vote.confidence,
                votes: 1,
            }),
        }
        tally.total_weight += vote.weight;
        tally.participants += 1;
    }
    tally
}

impl Tally {
    pub fn entries(&self) -> &[SignalWeight] {
        &self.entries
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn participant_count(&self) -> usize {
        self.participants
    }

    pub fn is_empty(&self) -> bool {
        self.participants == 0
    }

    pub fn weight_of(&self, signal: Signal) -> f64 {
        self.entries
            .iter()
            .find(|e| e.signal == signal)
            .map_or(0.0, |e| e.weight)
    }

    /// The heaviest signal, or None for an empty tally.
    pub fn winner(&self, tie_break: TieBreak) -> Option<Signal> {
        let mut best: Option<&SignalWeight> = None;
        for entry in &self.entries {
            best = match best {
                Some(current) if !beats(entry, current, tie_break) => Some(current),
                _ => Some(entry),
            };
        }
        best.map(|entry| entry.signal)
    }

    pub fn consensus(&self, tie_break: TieBreak, session_id: Uuid) -> ConsensusResult {
        let Some(winner) = self.winner(tie_break).filter(|_| self.total_weight > 0.0) else {
            return ConsensusResult::empty(session_id);
        };

        let vote_distribution: BTreeMap<Signal, f64> = self
            .entries
            .iter()
            .map(|e| (e.signal, e.weight / self.total_weight))
            .collect();

        ConsensusResult {
            winning_signal: winner,
            consensus_strength: (self.weight_of(winner) / self.total_weight).clamp(0.0, 1.0),
            vote_distribution,
            participant_count: self.participants,
            session_id,
            timestamp: Utc::now(),
            doubt_applied: false,
        }
    }
}

/// Whether `challenger`, seen later, displaces `current`.
fn beats(challenger: &SignalWeight, current: &SignalWeight, tie_break: TieBreak) -> bool {
    if (challenger.weight - current.weight).abs() > TIE_EPSILON {
        return challenger.weight > current.weight;
    }
    match tie_break {
        TieBreak::InsertionOrder => false,
        TieBreak::AggregateConfidence => {
            if (challenger.confidence - current.confidence).abs() > TIE_EPSILON {
                challenger.confidence > current.confidence
            } else {
                challenger.signal < current.signal
            }
        }
    }
}
