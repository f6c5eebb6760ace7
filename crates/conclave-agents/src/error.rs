use std::sync::Arc;

use conclave_memory::MemoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent registration rejected: {0}")]
    Registration(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Signal failed for {agent}: {reason}")]
    Signal { agent: String, reason: String },

    #[error("Knowledge lookup failed: {0}")]
    Knowledge(String),

    #[error("Knowledge command error: {0}")]
    Command(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Debate failed: {0}")]
    Debate(Arc<AgentError>),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Engine not available: {0}")]
    Unavailable(String),
}
