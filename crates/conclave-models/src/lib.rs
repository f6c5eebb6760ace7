pub mod agent;
pub mod config;
pub mod consensus;
pub mod context;
pub mod decision;
pub mod doubt;
pub mod memory;
pub mod memory_schema;
pub mod vote;

pub use agent::{Agent, Role, SignalRule};
pub use config::{
    AgentConfig, ConclaveConfig, DoubtConfig, EngineConfig, KnowledgeConfig, MemoryConfig,
    Personality, TieBreak, WisdomEntry,
};
pub use consensus::{ConsensusResult, Debate};
pub use context::{Fundamentals, MarketContext, Trend};
pub use decision::{
    confidence_decimal, ConfidenceBreakdown, Decision, DecisionType, ExpectedImpact,
    DECISION_SCHEMA_VERSION,
};
pub use doubt::{DoubtEvent, DoubtLevel};
pub use memory::{MemoryItem, MemoryKind, MemoryRecord, PerformanceEvaluation};
pub use memory_schema::MemoryRow;
pub use vote::{Signal, Vote};
