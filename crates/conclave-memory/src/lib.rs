pub mod compaction;
pub mod error;
pub mod journal;
pub mod maintenance;
pub mod relevance;
pub mod store;
pub mod tagging;

pub use compaction::CompactionStats;
pub use error::MemoryError;
pub use journal::SqliteJournal;
pub use maintenance::MaintenanceLoop;
pub use store::DecisionMemory;
