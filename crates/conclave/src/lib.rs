//! Conclave - multi-agent voting and consensus arbitration
//!
//! A directory of rule-driven agents votes on a market context, the votes are
//! tallied into a consensus, a doubt pass challenges that consensus, and an
//! executive arbiter blends it with its own temperament and recalled
//! decisions into a persisted [`Decision`](models::Decision).
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use conclave::models::{ConclaveConfig, MarketContext};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ConclaveConfig::default();
//! let arbiter = conclave::build_arbiter(&config)?;
//! let context = MarketContext::new("AAPL").with_trend("bullish");
//! let decision = conclave::decide(&arbiter, &context, conclave::request_timeout(&config)).await;
//! println!("{} {}", decision.decision_type.as_str(), decision.confidence);
//! # Ok(())
//! # }
//! ```

pub use conclave_agents as agents;
pub use conclave_cache as cache;
pub use conclave_memory as memory;
pub use conclave_models as models;

use std::sync::Arc;
use std::time::Duration;

use conclave_agents::{
    knowledge_from_config, safe_default, AgentDirectory, Arbiter, DoubtInjector,
    RuleBasedGenerator,
};
use conclave_memory::DecisionMemory;
use conclave_models::{ConclaveConfig, Decision, MarketContext};
use tracing::{error, info, warn};

/// Build an Arbiter, its agent directory and its decision memory from configuration.
pub fn build_arbiter(config: &ConclaveConfig) -> Result<Arbiter, anyhow::Error> {
    let directory = AgentDirectory::from_config(&config.agents, config.engine.vote_history_limit)?;
    if directory.is_empty() {
        warn!("No enabled agents configured; every decision will HOLD");
    }

    let memory = Arc::new(DecisionMemory::open(config.memory.clone())?);
    let generator = Arc::new(RuleBasedGenerator::new(&config.knowledge));
    let knowledge = knowledge_from_config(&config.knowledge);

    info!(
        agents = directory.len(),
        remembered = memory.len(),
        knowledge = knowledge.name(),
        personality = config.engine.personality.as_str(),
        "Arbiter ready"
    );

    Ok(Arbiter::new(
        config.engine.clone(),
        Arc::new(directory),
        DoubtInjector::new(config.doubt.clone()),
        memory,
    )
    .with_generator(generator)
    .with_knowledge(knowledge, Duration::from_secs(config.knowledge.timeout_seconds)))
}

/// The per-request bound configured for `decide`.
pub fn request_timeout(config: &ConclaveConfig) -> Duration {
    Duration::from_secs(config.engine.request_timeout_seconds)
}

/// Arbitrate `context`, never taking longer than `timeout`.
///
/// Errors and timeouts both yield the safe default HOLD, which is not stored.
pub async fn decide(arbiter: &Arbiter, context: &MarketContext, timeout: Duration) -> Decision {
    let personality = arbiter.engine().personality;
    match tokio::time::timeout(timeout, arbiter.decide(context)).await {
        Ok(Ok(decision)) => decision,
        Ok(Err(e)) => {
            error!(subject = %context.subject, error = %e, "Arbitration failed, returning safe default");
            safe_default(context, personality, &e.to_string())
        }
        Err(_) => {
            warn!(subject = %context.subject, timeout_ms = timeout.as_millis(), "Arbitration timed out, returning safe default");
            safe_default(
                context,
                personality,
                &format!("timed out after {}ms", timeout.as_millis()),
            )
        }
    }
}
