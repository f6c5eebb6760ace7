//! Optional collaborators that enrich an agent's vote with an insight.
//!
//! A lookup returns at most one snippet plus a relevance score. The caller
//! bounds every lookup with a timeout and treats errors and timeouts as
//! "nothing to add".

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conclave_models::{Agent, KnowledgeConfig, MarketContext, WisdomEntry};
use serde::{Deserialize, Serialize};

use crate::command::{invoke_command, CommandConfig};
use crate::error::AgentError;
use crate::parser::parse_insight;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub text: String,
    /// 0.0 to 1.0.
    pub relevance: f64,
}

impl Insight {
    pub fn new(text: &str, relevance: f64) -> Self {
        let relevance = if relevance.is_finite() {
            relevance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            text: text.to_string(),
            relevance,
        }
    }
}

/// Source of contextual insights. Mockable for testing.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(
        &self,
        agent: &Agent,
        context: &MarketContext,
    ) -> Result<Option<Insight>, AgentError>;
}

pub struct NoKnowledge;

#[async_trait]
impl KnowledgeSource for NoKnowledge {
    fn name(&self) -> &str {
        "none"
    }

    async fn lookup(&self, _: &Agent, _: &MarketContext) -> Result<Option<Insight>, AgentError> {
        Ok(None)
    }
}

/// Canned insights matched on the agent's department, its rule and the
/// context's trend label. An entry applies when all of its tags match;
/// the most relevant applicable entry wins.
pub struct WisdomTable {
    entries: Vec<WisdomEntry>,
}

impl WisdomTable {
    pub fn new(entries: Vec<WisdomEntry>) -> Self {
        Self { entries }
    }

    pub fn best_match(&self, agent: &Agent, context: &MarketContext) -> Option<Insight> {
        let mut keys = BTreeSet::from([agent.department.as_str(), agent.rule.as_str()]);
        if let Some(trend) = context.trend() {
            keys.insert(trend.as_str());
        }

        self.entries
            .iter()
            .filter(|entry| !entry.tags.is_empty())
            .filter(|entry| entry.tags.iter().all(|tag| keys.contains(tag.as_str())))
            .max_by(|a, b| a.relevance.total_cmp(&b.relevance))
            .map(|entry| Insight::new(&entry.text, entry.relevance))
    }
}

#[async_trait]
impl KnowledgeSource for WisdomTable {
    fn name(&self) -> &str {
        "wisdom_table"
    }

    async fn lookup(
        &self,
        agent: &Agent,
        context: &MarketContext,
    ) -> Result<Option<Insight>, AgentError> {
        Ok(self.best_match(agent, context))
    }
}

/// Asks an external program. The program receives a JSON request as its last
/// argument and answers with `{"text": ..., "relevance": ...}`.
pub struct CommandKnowledge {
    config: CommandConfig,
}

impl CommandKnowledge {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl KnowledgeSource for CommandKnowledge {
    fn name(&self) -> &str {
        &self.config.program
    }

    async fn lookup(
        &self,
        agent: &Agent,
        context: &MarketContext,
    ) -> Result<Option<Insight>, AgentError> {
        let request = serde_json::json!({
            "agent": agent.name,
            "department": agent.department,
            "rule": agent.rule,
            "subject": context.subject,
            "market_trend": context.market_trend,
            "volatility": context.volatility,
        });
        let raw = invoke_command(&self.config, &request.to_string()).await?;
        parse_insight(&raw)
    }
}

/// Pick the knowledge source a configuration asks for: an external command
/// if one is set, else the inline wisdom table, else nothing.
pub fn knowledge_from_config(config: &KnowledgeConfig) -> Arc<dyn KnowledgeSource> {
    match &config.command {
        Some(program) => Arc::new(CommandKnowledge::new(CommandConfig {
            program: program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })),
        None if !config.entries.is_empty() => Arc::new(WisdomTable::new(config.entries.clone())),
        None => Arc::new(NoKnowledge),
    }
}
