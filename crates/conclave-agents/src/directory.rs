use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use conclave_models::{Agent, AgentConfig, Vote};
use tracing::{debug, info};

use crate::error::AgentError;

#[derive(Default)]
struct Registry {
    /// Registration order.
    agents: Vec<Agent>,
    index: HashMap<String, usize>,
    history: HashMap<String, VecDeque<Vote>>,
}

/// Registry of voting agents, keyed by unique name.
///
/// Agents are never removed once registered. Their confidence follows their
/// most recent vote, and a short per-agent vote history is kept for
/// reporting only.
pub struct AgentDirectory {
    registry: RwLock<Registry>,
    history_limit: usize,
}

impl AgentDirectory {
    pub fn new(history_limit: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            history_limit,
        }
    }

    /// Build a directory from the enabled entries of a roster.
    pub fn from_config(roster: &[AgentConfig], history_limit: usize) -> Result<Self, AgentError> {
        let directory = Self::new(history_limit);
        for entry in roster.iter().filter(|entry| entry.enabled) {
            let mut agent = if entry.persona {
                Agent::persona(&entry.name, &entry.department, entry.role, entry.rule)
            } else {
                Agent::new(&entry.name, &entry.department, entry.role, entry.rule)
            };
            if let Some(weight) = entry.weight {
                agent = agent.with_weight(weight);
            }
            directory.register(agent)?;
        }
        info!(agents = directory.len(), "Agent directory ready");
        Ok(directory)
    }

    pub fn register(&self, agent: Agent) -> Result<(), AgentError> {
        if agent.name.trim().is_empty() {
            return Err(AgentError::Registration("agent name is empty".to_string()));
        }
        if !agent.base_weight.is_finite() || agent.base_weight <= 0.0 {
            return Err(AgentError::Registration(format!(
                "{}: weight must be positive, got {}",
                agent.name, agent.base_weight
            )));
        }
        if !(0.0..=1.0).contains(&agent.confidence) {
            return Err(AgentError::Registration(format!(
                "{}: confidence {} outside [0, 1]",
                agent.name, agent.confidence
            )));
        }

        let mut registry = self.write()?;
        if registry.index.contains_key(&agent.name) {
            return Err(AgentError::Registration(format!(
                "{}: already registered",
                agent.name
            )));
        }
        debug!(agent = %agent.name, role = agent.role.as_str(), weight = agent.base_weight, "Registered agent");
        let position = registry.agents.len();
        registry.index.insert(agent.name.clone(), position);
        registry.agents.push(agent);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<Agent>, AgentError> {
        let registry = self.read()?;
        Ok(registry
            .index
            .get(name)
            .map(|&position| registry.agents[position].clone()))
    }

    /// Snapshot of all agents in registration order.
    pub fn agents(&self) -> Result<Vec<Agent>, AgentError> {
        Ok(self.read()?.agents.clone())
    }

    pub fn len(&self) -> usize {
        self.read().map(|registry| registry.agents.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_confidence(&self, name: &str, confidence: f64) -> Result<(), AgentError> {
        let mut registry = self.write()?;
        let position = *registry
            .index
            .get(name)
            .ok_or_else(|| AgentError::UnknownAgent(name.to_string()))?;
        registry.agents[position].confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(())
    }

    /// Append to the voter's history. Abstentions are kept in the history
    /// but leave the agent's confidence where it was.
    pub fn record_vote(&self, vote: &Vote) -> Result<(), AgentError> {
        let mut registry = self.write()?;
        let position = *registry
            .index
            .get(&vote.agent)
            .ok_or_else(|| AgentError::UnknownAgent(vote.agent.clone()))?;
        if !vote.is_abstention() {
            registry.agents[position].confidence = vote.confidence;
        }

        let limit = self.history_limit;
        let history = registry.history.entry(vote.agent.clone()).or_default();
        history.push_back(vote.clone());
        while history.len() > limit {
            history.pop_front();
        }
        Ok(())
    }

    /// Oldest first.
    pub fn vote_history(&self, name: &str) -> Result<Vec<Vote>, AgentError> {
        let registry = self.read()?;
        Ok(registry
            .history
            .get(name)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Registry>, AgentError> {
        self.registry
            .read()
            .map_err(|e| AgentError::Unavailable(format!("agent directory poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Registry>, AgentError> {
        self.registry
            .write()
            .map_err(|e| AgentError::Unavailable(format!("agent directory poisoned: {e}")))
    }
}
