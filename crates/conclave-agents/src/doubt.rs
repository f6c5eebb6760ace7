//! The doubt injector: second-guesses consensus that is too perfect or too
//! divided, and occasionally drops a line of wisdom.

use std::collections::VecDeque;
use std::sync::Mutex;

use conclave_models::{ConsensusResult, DoubtConfig, DoubtEvent, DoubtLevel, Signal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

const WISDOM: &[&str] = &[
    "The market can stay irrational longer than you can stay solvent",
    "Plan the exit before the entry",
    "No one rings a bell at the top",
    "Cut losers early, let winners run",
];

#[derive(Default)]
struct DoubtLog {
    /// Recent non-veto events, bounded.
    recent: VecDeque<DoubtEvent>,
    /// Every veto ever issued.
    vetoes: Vec<DoubtEvent>,
}

pub struct DoubtInjector {
    config: DoubtConfig,
    rng: Mutex<StdRng>,
    log: Mutex<DoubtLog>,
}

impl DoubtInjector {
    pub fn new(config: DoubtConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Deterministic wisdom drops, for tests and replays.
    pub fn with_seed(config: DoubtConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: DoubtConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
            log: Mutex::new(DoubtLog::default()),
        }
    }

    pub fn config(&self) -> &DoubtConfig {
        &self.config
    }

    /// Judge one consensus. At most one event fires, checked in the order
    /// divine doubt, veto, caution, wisdom. Any event is logged.
    pub fn inspect(
        &self,
        origin: &str,
        consensus_strength: f64,
        volatility: f64,
    ) -> Option<DoubtEvent> {
        let event = self.classify(origin, consensus_strength, volatility)?;
        self.record(&event);
        Some(event)
    }

    fn classify(&self, origin: &str, strength: f64, volatility: f64) -> Option<DoubtEvent> {
        let config = &self.config;

        if strength > config.high_consensus_threshold {
            return Some(DoubtEvent::new(
                origin,
                DoubtLevel::DivineDoubt,
                format!(
                    "Divine doubt: {:.0}% agreement is too good to be true, deferring",
                    strength * 100.0
                ),
            ));
        }
        if strength < config.low_consensus_threshold {
            return Some(DoubtEvent::new(
                origin,
                DoubtLevel::Veto,
                format!(
                    "Veto: {:.0}% consensus is too divided to act on, taking a defensive posture",
                    strength * 100.0
                ),
            ));
        }
        if volatility > config.volatility_threshold {
            return Some(DoubtEvent::new(
                origin,
                DoubtLevel::CautionNudge,
                format!(
                    "Caution: volatility {volatility:.2} exceeds {:.2}, size conservatively",
                    config.volatility_threshold
                ),
            ));
        }

        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(_) => {
                warn!("Doubt rng poisoned, skipping wisdom roll");
                return None;
            }
        };
        if rng.gen::<f64>() < config.wisdom_drop_probability {
            let line = WISDOM[rng.gen_range(0..WISDOM.len())];
            return Some(DoubtEvent::new(
                origin,
                DoubtLevel::WisdomDrop,
                format!("Wisdom: {line}"),
            ));
        }
        None
    }

    /// Apply an event's effect to a consensus. Divine doubt defers and
    /// discounts strength; a veto blocks position-taking. Caution and wisdom
    /// leave the consensus alone.
    pub fn apply(&self, event: &DoubtEvent, consensus: &mut ConsensusResult) {
        match event.level {
            DoubtLevel::DivineDoubt => {
                consensus.winning_signal = Signal::Defer;
                consensus.consensus_strength *= self.config.divine_doubt_factor;
            }
            DoubtLevel::Veto => {
                consensus.winning_signal = Signal::Reject;
            }
            DoubtLevel::CautionNudge | DoubtLevel::WisdomDrop => return,
        }
        consensus.doubt_applied = true;
    }

    fn record(&self, event: &DoubtEvent) {
        info!(origin = %event.origin, level = event.level.as_str(), message = %event.message, "Doubt injected");
        let Ok(mut log) = self.log.lock() else {
            warn!("Doubt log poisoned, event not recorded");
            return;
        };
        if event.level == DoubtLevel::Veto {
            log.vetoes.push(event.clone());
            return;
        }
        log.recent.push_back(event.clone());
        while log.recent.len() > self.config.history_limit {
            log.recent.pop_front();
        }
    }

    /// Retained events, vetoes included, oldest first.
    pub fn history(&self) -> Vec<DoubtEvent> {
        let Ok(log) = self.log.lock() else {
            return Vec::new();
        };
        let mut events: Vec<DoubtEvent> =
            log.recent.iter().chain(log.vetoes.iter()).cloned().collect();
        events.sort_by_key(|event| event.timestamp);
        events
    }

    pub fn vetoes(&self) -> Vec<DoubtEvent> {
        self.log
            .lock()
            .map(|log| log.vetoes.clone())
            .unwrap_or_default()
    }
}
