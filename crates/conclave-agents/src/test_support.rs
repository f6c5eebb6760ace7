//! Scripted collaborators for arbitration tests.
//!
//! `ScriptedGenerator` replaces the rule engine with fixed per-agent votes so
//! a scenario can pin down exact weights. The knowledge sources cover the
//! enrichment paths: a fixed answer, a slow answer and a failure.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conclave_models::{Agent, MarketContext, Signal, Vote};

use crate::error::AgentError;
use crate::knowledge::{Insight, KnowledgeSource};
use crate::signal::SignalGenerator;

/// Votes a fixed signal and confidence per agent name. Agents without a
/// script vote HOLD at 0.5. Context overrides still apply.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: HashMap<String, (Signal, f64)>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, agent: &str, signal: Signal, confidence: f64) -> Self {
        self.script.insert(agent.to_string(), (signal, confidence));
        self
    }

    /// Votes generated so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignalGenerator for ScriptedGenerator {
    fn signal(
        &self,
        agent: &Agent,
        context: &MarketContext,
        insight: Option<&Insight>,
    ) -> Result<Vote, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (scripted, confidence) = self
            .script
            .get(&agent.name)
            .copied()
            .unwrap_or((Signal::Hold, 0.5));
        let signal = context.overrides.get(&agent.name).copied().unwrap_or(scripted);

        let mut reasoning = format!("scripted {signal}");
        if let Some(insight) = insight {
            reasoning.push_str(&format!(" [{}]", insight.text));
        }
        let vote = Vote::new(agent, signal, confidence, reasoning);
        Ok(if signal != scripted {
            vote.overriding(scripted)
        } else {
            vote
        })
    }
}

/// Fails for the named agents and delegates everyone else.
pub struct FailingGenerator {
    failing: HashSet<String>,
    inner: Arc<dyn SignalGenerator>,
}

impl FailingGenerator {
    pub fn new(inner: Arc<dyn SignalGenerator>, failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|name| name.to_string()).collect(),
            inner,
        }
    }
}

impl SignalGenerator for FailingGenerator {
    fn signal(
        &self,
        agent: &Agent,
        context: &MarketContext,
        insight: Option<&Insight>,
    ) -> Result<Vote, AgentError> {
        if self.failing.contains(&agent.name) {
            return Err(AgentError::Signal {
                agent: agent.name.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        self.inner.signal(agent, context, insight)
    }
}

/// Answers every lookup with the same insight after an optional delay.
pub struct ScriptedKnowledge {
    insight: Option<Insight>,
    delay: Duration,
}

impl ScriptedKnowledge {
    pub fn new(text: &str, relevance: f64) -> Self {
        Self {
            insight: Some(Insight::new(text, relevance)),
            delay: Duration::ZERO,
        }
    }

    /// Same answer, but only after `delay`.
    pub fn slow(text: &str, relevance: f64, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(text, relevance)
        }
    }
}

#[async_trait]
impl KnowledgeSource for ScriptedKnowledge {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn lookup(&self, _: &Agent, _: &MarketContext) -> Result<Option<Insight>, AgentError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.insight.clone())
    }
}

/// Every lookup errors.
pub struct BrokenKnowledge;

#[async_trait]
impl KnowledgeSource for BrokenKnowledge {
    fn name(&self) -> &str {
        "broken"
    }

    async fn lookup(&self, _: &Agent, _: &MarketContext) -> Result<Option<Insight>, AgentError> {
        Err(AgentError::Knowledge("source offline".to_string()))
    }
}
