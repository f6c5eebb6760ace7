pub mod arbiter;
pub mod command;
pub mod directory;
pub mod doubt;
pub mod error;
pub mod knowledge;
pub mod parser;
pub mod signal;
pub mod tally;

pub mod test_support;

pub use arbiter::{safe_default, Arbiter};
pub use directory::AgentDirectory;
pub use doubt::DoubtInjector;
pub use error::AgentError;
pub use knowledge::{knowledge_from_config, Insight, KnowledgeSource};
pub use signal::{RuleBasedGenerator, SignalGenerator};
pub use tally::{tally, Tally};
