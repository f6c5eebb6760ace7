use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Memory not available: {0}")]
    Unavailable(String),

    #[error("Memory item not found: {0}")]
    NotFound(Uuid),

    #[error("Corrupt journal row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}
