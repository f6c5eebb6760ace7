use serde::{Deserialize, Serialize};

use crate::agent::{Role, SignalRule};

/// Top-level configuration for Conclave.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConclaveConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub doubt: DoubtConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default = "default_roster")]
    pub agents: Vec<AgentConfig>,
}

impl Default for ConclaveConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            doubt: DoubtConfig::default(),
            memory: MemoryConfig::default(),
            knowledge: KnowledgeConfig::default(),
            agents: default_roster(),
        }
    }
}

/// Executive temperament. Scales the arbiter's own base confidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    Conservative,
    Aggressive,
    #[default]
    Balanced,
    Adaptive,
}

impl Personality {
    pub fn factor(self) -> f64 {
        match self {
            Self::Conservative => 0.8,
            Self::Aggressive => 1.2,
            Self::Balanced | Self::Adaptive => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
            Self::Balanced => "balanced",
            Self::Adaptive => "adaptive",
        }
    }
}

/// How the tally resolves equal winning weights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Highest aggregate confidence, then lexical signal order.
    #[default]
    AggregateConfidence,
    /// First signal to appear in the vote sequence wins.
    InsertionOrder,
}

/// Arbitration pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub personality: Personality,
    /// How long a debate result is reused for the same subject.
    pub debate_ttl_seconds: u64,
    pub debate_cache_capacity: u64,
    pub tie_break: TieBreak,
    /// Share of the final confidence taken from the executive's own base
    /// confidence. The remainder comes from consensus strength.
    pub executive_weight: f64,
    pub memory_boost_per_item: f64,
    pub memory_boost_cap: f64,
    /// Multiplied by context volatility and subtracted from base confidence.
    pub volatility_penalty_factor: f64,
    /// Upper bound for a whole decide() call at the facade.
    pub request_timeout_seconds: u64,
    /// Recent consensus results kept for transparency endpoints.
    pub consensus_log_limit: usize,
    /// Votes retained per agent for reporting.
    pub vote_history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            personality: Personality::Balanced,
            debate_ttl_seconds: 30,
            debate_cache_capacity: 10_000,
            tie_break: TieBreak::AggregateConfidence,
            executive_weight: 0.7,
            memory_boost_per_item: 0.06,
            memory_boost_cap: 0.3,
            volatility_penalty_factor: 0.2,
            request_timeout_seconds: 10,
            consensus_log_limit: 100,
            vote_history_limit: 50,
        }
    }
}

/// Thresholds for the doubt injector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DoubtConfig {
    /// Consensus strictly above this triggers DIVINE_DOUBT.
    pub high_consensus_threshold: f64,
    /// Consensus strictly below this triggers VETO.
    pub low_consensus_threshold: f64,
    /// Volatility strictly above this triggers CAUTION_NUDGE.
    pub volatility_threshold: f64,
    pub wisdom_drop_probability: f64,
    /// Consensus strength multiplier applied by DIVINE_DOUBT.
    pub divine_doubt_factor: f64,
    /// Final confidence multiplier applied on VETO.
    pub veto_penalty: f64,
    /// Non-veto events retained in the injector's log.
    pub history_limit: usize,
}

impl Default for DoubtConfig {
    fn default() -> Self {
        Self {
            high_consensus_threshold: 0.98,
            low_consensus_threshold: 0.35,
            volatility_threshold: 0.65,
            wisdom_drop_probability: 0.03,
            divine_doubt_factor: 0.7,
            veto_penalty: 0.5,
            history_limit: 500,
        }
    }
}

/// Decision memory settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Journal file. Memory is process-local when unset.
    pub sqlite_path: Option<String>,
    pub recall_limit: usize,
    /// Items must score strictly above this to be recalled.
    pub relevance_threshold: f64,
    /// Hard cap on items held in memory.
    pub max_items: usize,
    /// Compaction drops items older than this.
    pub retention_days: u32,
    pub compaction_interval_seconds: u64,
    /// Only items below this importance are merged by compaction.
    pub compaction_importance_threshold: f64,
    /// Items further apart than this are never merged together.
    pub compaction_window_hours: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            recall_limit: 5,
            relevance_threshold: 0.3,
            max_items: 50_000,
            retention_days: 365,
            compaction_interval_seconds: 3600,
            compaction_importance_threshold: 0.4,
            compaction_window_hours: 24,
        }
    }
}

/// External knowledge lookups that may nudge an agent's confidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Per-lookup bound. A timeout means no enrichment.
    pub timeout_seconds: u64,
    /// Nudged confidence never exceeds this.
    pub confidence_ceiling: f64,
    /// Confidence added per unit of insight relevance.
    pub nudge_scale: f64,
    /// External program answering lookups. Takes precedence over `entries`.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub entries: Vec<WisdomEntry>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 3,
            confidence_ceiling: 0.98,
            nudge_scale: 0.1,
            command: None,
            args: vec![],
            entries: default_wisdom(),
        }
    }
}

/// A canned insight keyed by tags (department, rule or trend label).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WisdomEntry {
    pub tags: Vec<String>,
    pub text: String,
    /// 0.0 to 1.0.
    pub relevance: f64,
}

/// Configuration for a single agent in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub department: String,
    pub role: Role,
    pub rule: SignalRule,
    #[serde(default)]
    pub persona: bool,
    /// Override the role-derived weight. Must be positive.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AgentConfig {
    fn new(name: &str, department: &str, role: Role, rule: SignalRule, persona: bool) -> Self {
        Self {
            name: name.to_string(),
            department: department.to_string(),
            role,
            rule,
            persona,
            weight: None,
            enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Five personas and six generic specialists across four departments.
pub fn default_roster() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new("value_sage", "research", Role::Senior, SignalRule::Value, true),
        AgentConfig::new("momentum_rider", "trading", Role::Specialist, SignalRule::Momentum, true),
        AgentConfig::new("contrarian", "strategy", Role::Specialist, SignalRule::Contrarian, true),
        AgentConfig::new("growth_hunter", "research", Role::Specialist, SignalRule::Growth, true),
        AgentConfig::new("risk_warden", "risk", Role::Senior, SignalRule::RiskGuard, true),
        AgentConfig::new("fundamental_analyst", "research", Role::Analyst, SignalRule::Fundamental, false),
        AgentConfig::new("sector_specialist", "research", Role::Specialist, SignalRule::Growth, false),
        AgentConfig::new("flow_trader", "trading", Role::Specialist, SignalRule::TrendFollowing, false),
        AgentConfig::new("desk_head", "trading", Role::Senior, SignalRule::Balanced, false),
        AgentConfig::new("risk_officer", "risk", Role::Senior, SignalRule::RiskGuard, false),
        AgentConfig::new("strategy_director", "strategy", Role::Director, SignalRule::Balanced, false),
    ]
}

fn default_wisdom() -> Vec<WisdomEntry> {
    let entry = |tags: &[&str], text: &str, relevance: f64| WisdomEntry {
        tags: tags.iter().map(|t| t.to_string()).collect(),
        text: text.to_string(),
        relevance,
    };
    vec![
        entry(&["value", "research"], "Price is what you pay; value is what you get", 0.6),
        entry(&["momentum", "bullish"], "Trends persist longer than most expect", 0.5),
        entry(&["contrarian", "bearish"], "The crowd is loudest at the turn", 0.6),
        entry(&["risk_guard", "risk"], "Size positions for the storm, not the forecast", 0.7),
    ]
}
