use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use conclave_cache::DebateCache;
use conclave_memory::{DecisionMemory, MemoryError};
use conclave_models::{
    confidence_decimal, Agent, ConfidenceBreakdown, ConsensusResult, Debate, Decision,
    DecisionType, DoubtEvent, EngineConfig, ExpectedImpact, MarketContext, PerformanceEvaluation,
    Personality, Signal, Trend, Vote, DECISION_SCHEMA_VERSION,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::directory::AgentDirectory;
use crate::doubt::DoubtInjector;
use crate::error::AgentError;
use crate::knowledge::{Insight, KnowledgeSource, NoKnowledge};
use crate::signal::{RuleBasedGenerator, SignalGenerator};
use crate::tally::tally;

/// Confidence reported by the safe default decision.
pub const SAFE_DEFAULT_CONFIDENCE: f64 = 0.1;
/// Supporting justifications quoted in a decision's reasoning.
const MAX_JUSTIFICATIONS: usize = 2;

/// The executive: runs (or reuses) a debate, weighs it against its own
/// temperament and past decisions, and records the result.
pub struct Arbiter {
    engine: EngineConfig,
    directory: Arc<AgentDirectory>,
    generator: Arc<dyn SignalGenerator>,
    knowledge: Arc<dyn KnowledgeSource>,
    knowledge_timeout: Duration,
    cache: DebateCache,
    doubt: DoubtInjector,
    memory: Arc<DecisionMemory>,
    consensus_log: Mutex<VecDeque<ConsensusResult>>,
}

impl Arbiter {
    pub fn new(
        engine: EngineConfig,
        directory: Arc<AgentDirectory>,
        doubt: DoubtInjector,
        memory: Arc<DecisionMemory>,
    ) -> Self {
        Self {
            cache: DebateCache::new(engine.debate_cache_capacity),
            engine,
            directory,
            generator: Arc::new(RuleBasedGenerator::default()),
            knowledge: Arc::new(NoKnowledge),
            knowledge_timeout: Duration::from_secs(3),
            doubt,
            memory,
            consensus_log: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn SignalGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Consult `knowledge` for every vote, giving each lookup at most `timeout`.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeSource>, timeout: Duration) -> Self {
        self.knowledge = knowledge;
        self.knowledge_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn memory(&self) -> &Arc<DecisionMemory> {
        &self.memory
    }

    pub fn cache(&self) -> &DebateCache {
        &self.cache
    }

    /// Arbitrate one context into a persisted decision.
    ///
    /// Either the decision is stored in memory and returned, or nothing is
    /// stored and the error is returned.
    pub async fn decide(&self, context: &MarketContext) -> Result<Decision, AgentError> {
        let start = Instant::now();
        info!(subject = %context.subject, trend = %context.market_trend, volatility = context.volatility, "Arbitration starting");

        let debate = self.debate(context).await?;
        let recalled = self
            .memory
            .recall(context, self.memory.config().recall_limit)?;

        let breakdown = self.confidence_breakdown(context, &debate, recalled.len());
        let signal = debate.consensus.winning_signal;
        let decision = Decision {
            id: Uuid::new_v4(),
            schema_version: DECISION_SCHEMA_VERSION,
            timestamp: Utc::now(),
            subject: context.subject.clone(),
            decision_type: DecisionType::from_signal(signal),
            signal,
            context: context.clone(),
            reasoning: compose_reasoning(context, &debate, recalled.len(), self.engine.personality),
            confidence: confidence_decimal(breakdown.final_confidence),
            expected_impact: expected_impact(breakdown.final_confidence),
            breakdown,
            overrides: debate.overrides.clone(),
            memory_references: recalled.iter().map(|item| item.id).collect(),
            session_id: debate.consensus.session_id,
        };

        self.memory.store(decision.clone())?;

        info!(
            subject = %decision.subject,
            decision = decision.decision_type.as_str(),
            confidence = %decision.confidence,
            recalled = decision.memory_references.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Decision recorded"
        );
        Ok(decision)
    }

    /// `decide`, degrading to a HOLD that says why on any failure.
    pub async fn decide_or_default(&self, context: &MarketContext) -> Decision {
        match self.decide(context).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(subject = %context.subject, error = %e, "Arbitration failed, returning safe default");
                safe_default(context, self.engine.personality, &e.to_string())
            }
        }
    }

    /// The debate for this subject, reused while it is fresh.
    pub async fn debate(&self, context: &MarketContext) -> Result<Debate, AgentError> {
        let ttl = Duration::from_secs(self.engine.debate_ttl_seconds);
        self.cache
            .get_or_compute(&context.subject, || self.run_debate(context), ttl)
            .await
            .map_err(AgentError::Debate)
    }

    async fn run_debate(&self, context: &MarketContext) -> Result<Debate, AgentError> {
        let start = Instant::now();
        let agents = self.directory.agents()?;

        let mut votes = Vec::with_capacity(agents.len());
        let mut overrides = Vec::new();
        for agent in &agents {
            let vote = self.cast_vote(agent, context).await;
            if vote.overridden_from.is_some() && !vote.is_abstention() {
                overrides.push(format!("override:{}={}", agent.name, vote.signal));
            }
            if let Err(e) = self.directory.record_vote(&vote) {
                warn!(agent = %agent.name, error = %e, "Failed to record vote");
            }
            votes.push(vote);
        }

        let tally = tally(&votes);
        let mut consensus = tally.consensus(self.engine.tie_break, Uuid::new_v4());
        let tallied_signal = consensus.winning_signal;

        // An empty tally has nothing to doubt.
        let doubt = if tally.is_empty() {
            None
        } else {
            self.doubt
                .inspect(&context.subject, consensus.consensus_strength, context.volatility)
        };
        if let Some(event) = &doubt {
            self.doubt.apply(event, &mut consensus);
            if consensus.doubt_applied {
                overrides.push(format!("doubt:{}", event.level.as_str().to_ascii_lowercase()));
            }
        }

        self.log_consensus(&consensus);
        info!(
            subject = %context.subject,
            signal = %consensus.winning_signal,
            strength = consensus.consensus_strength,
            participants = consensus.participant_count,
            abstentions = votes.len() - consensus.participant_count,
            elapsed_ms = start.elapsed().as_millis(),
            "Debate complete"
        );

        Ok(Debate {
            subject: context.subject.clone(),
            consensus,
            tallied_signal,
            votes,
            doubt,
            overrides,
        })
    }

    /// One agent's vote. Failures become a zero-weight abstention.
    async fn cast_vote(&self, agent: &Agent, context: &MarketContext) -> Vote {
        let insight = self.consult(agent, context).await;
        match self.generator.signal(agent, context, insight.as_ref()) {
            Ok(vote) => {
                debug!(agent = %agent.name, signal = %vote.signal, confidence = vote.confidence, "Vote cast");
                vote
            }
            Err(e) => {
                warn!(agent = %agent.name, subject = %context.subject, error = %e, "Signal failed, abstaining");
                Vote::abstain(&agent.name, format!("Signal unavailable: {e}"))
            }
        }
    }

    async fn consult(&self, agent: &Agent, context: &MarketContext) -> Option<Insight> {
        match tokio::time::timeout(self.knowledge_timeout, self.knowledge.lookup(agent, context)).await {
            Ok(Ok(insight)) => insight,
            Ok(Err(e)) => {
                warn!(agent = %agent.name, source = self.knowledge.name(), error = %e, "Knowledge lookup failed");
                None
            }
            Err(_) => {
                debug!(agent = %agent.name, source = self.knowledge.name(), "Knowledge lookup timed out");
                None
            }
        }
    }

    fn confidence_breakdown(
        &self,
        context: &MarketContext,
        debate: &Debate,
        recalled: usize,
    ) -> ConfidenceBreakdown {
        let engine = &self.engine;
        let memory_boost = memory_boost(recalled, engine.memory_boost_per_item, engine.memory_boost_cap);
        let volatility_penalty = volatility_penalty(context.volatility, engine.volatility_penalty_factor);
        let base = base_confidence(
            personality_factor(engine.personality),
            memory_boost,
            volatility_penalty,
        );
        let consensus = debate.consensus.consensus_strength;
        let blended = blend_confidence(base, consensus, engine.executive_weight);
        let vetoed = debate.vetoed();
        let final_confidence = if vetoed {
            apply_veto_penalty(blended, self.doubt.config().veto_penalty)
        } else {
            blended
        };

        ConfidenceBreakdown {
            personality: engine.personality,
            memory_boost,
            volatility_penalty,
            base,
            consensus,
            blended,
            veto_penalty_applied: vetoed,
            final_confidence,
        }
    }

    fn log_consensus(&self, consensus: &ConsensusResult) {
        let Ok(mut log) = self.consensus_log.lock() else {
            warn!("Consensus log poisoned");
            return;
        };
        log.push_back(consensus.clone());
        while log.len() > self.engine.consensus_log_limit {
            log.pop_front();
        }
    }

    /// Recently computed consensus results, oldest first.
    pub fn recent_consensus(&self) -> Vec<ConsensusResult> {
        self.consensus_log
            .lock()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn doubt_history(&self) -> Vec<DoubtEvent> {
        self.doubt.history()
    }

    pub fn vetoes(&self) -> Vec<DoubtEvent> {
        self.doubt.vetoes()
    }

    /// Store how a past decision played out. The decision must still be in
    /// memory.
    pub fn record_evaluation(&self, evaluation: PerformanceEvaluation) -> Result<Uuid, AgentError> {
        if self.memory.decision(evaluation.decision_id)?.is_none() {
            return Err(MemoryError::NotFound(evaluation.decision_id).into());
        }
        let id = self.memory.store(evaluation)?;
        Ok(id)
    }
}

pub fn personality_factor(personality: Personality) -> f64 {
    personality.factor()
}

/// Grows with the amount of relevant history, up to `cap`.
pub fn memory_boost(recalled: usize, per_item: f64, cap: f64) -> f64 {
    (recalled as f64 * per_item).min(cap)
}

/// Unusable volatility readings are penalized as if volatility were 1.0.
pub fn volatility_penalty(volatility: f64, factor: f64) -> f64 {
    if volatility.is_finite() {
        factor * volatility.max(0.0)
    } else {
        factor
    }
}

pub fn base_confidence(personality_factor: f64, memory_boost: f64, volatility_penalty: f64) -> f64 {
    (personality_factor * 0.5 + memory_boost - volatility_penalty).clamp(0.1, 1.0)
}

pub fn blend_confidence(base: f64, consensus: f64, executive_weight: f64) -> f64 {
    (executive_weight * base + (1.0 - executive_weight) * consensus).clamp(0.0, 1.0)
}

pub fn apply_veto_penalty(confidence: f64, penalty: f64) -> f64 {
    confidence * penalty
}

pub fn expected_impact(confidence: f64) -> ExpectedImpact {
    ExpectedImpact::from_confidence(confidence)
}

/// Clauses, in order: consensus summary, up to two supporting votes, trend,
/// memory, personality, then the doubt message if one fired.
pub fn compose_reasoning(
    context: &MarketContext,
    debate: &Debate,
    recalled: usize,
    personality: Personality,
) -> String {
    let consensus = &debate.consensus;
    let mut clauses = Vec::new();

    let tallied_share = consensus
        .vote_distribution
        .get(&debate.tallied_signal)
        .copied()
        .unwrap_or(0.0);
    let mut summary = format!(
        "Consensus {} at {:.0}% across {} agents",
        debate.tallied_signal,
        tallied_share * 100.0,
        consensus.participant_count
    );
    if consensus.winning_signal != debate.tallied_signal {
        summary.push_str(&format!(", overridden to {}", consensus.winning_signal));
    }
    clauses.push(summary);

    for vote in debate.supporting_votes().into_iter().take(MAX_JUSTIFICATIONS) {
        clauses.push(format!("{}: {}", vote.agent, vote.reasoning));
    }

    clauses.push(match context.trend() {
        Some(Trend::Bullish) => "Market trend is bullish".to_string(),
        Some(Trend::Bearish) => "Market trend is bearish".to_string(),
        Some(Trend::Neutral) => "Market trend is neutral".to_string(),
        None => format!("Market trend '{}' not recognized", context.market_trend),
    });

    clauses.push(match recalled {
        0 => "No relevant precedent in memory".to_string(),
        1 => "1 relevant precedent recalled".to_string(),
        n => format!("{n} relevant precedents recalled"),
    });

    clauses.push(format!(
        "{} executive stance (x{:.1})",
        capitalize(personality.as_str()),
        personality.factor()
    ));

    if let Some(event) = &debate.doubt {
        clauses.push(event.message.clone());
    }

    clauses.join("; ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// HOLD at low confidence, explaining that arbitration was unavailable.
/// Never stored in memory.
pub fn safe_default(context: &MarketContext, personality: Personality, reason: &str) -> Decision {
    Decision {
        id: Uuid::new_v4(),
        schema_version: DECISION_SCHEMA_VERSION,
        timestamp: Utc::now(),
        subject: context.subject.clone(),
        decision_type: DecisionType::Hold,
        signal: Signal::Hold,
        context: context.clone(),
        reasoning: format!("Arbitration unavailable ({reason}); holding"),
        confidence: confidence_decimal(SAFE_DEFAULT_CONFIDENCE),
        breakdown: ConfidenceBreakdown {
            personality,
            final_confidence: SAFE_DEFAULT_CONFIDENCE,
            ..Default::default()
        },
        expected_impact: ExpectedImpact::Low,
        overrides: vec![],
        memory_references: vec![],
        session_id: Uuid::nil(),
    }
}
