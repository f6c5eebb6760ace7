/// The SQLite table the decision memory journals into.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS memory_items (
///     id            TEXT PRIMARY KEY,
///     kind          TEXT NOT NULL,
///     content_json  TEXT NOT NULL,
///     tags_json     TEXT NOT NULL,
///     owner_id      TEXT NOT NULL,
///     importance    REAL NOT NULL,
///     merged_count  INTEGER NOT NULL,
///     created_at    TEXT NOT NULL
/// );
/// ```
///
/// `created_at` is RFC 3339 in UTC, so lexical order is chronological.
pub const MEMORY_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS memory_items (
    id            TEXT PRIMARY KEY,
    kind          TEXT NOT NULL,
    content_json  TEXT NOT NULL,
    tags_json     TEXT NOT NULL,
    owner_id      TEXT NOT NULL,
    importance    REAL NOT NULL,
    merged_count  INTEGER NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_kind ON memory_items(kind);
CREATE INDEX IF NOT EXISTS idx_memory_owner ON memory_items(owner_id);
CREATE INDEX IF NOT EXISTS idx_memory_created ON memory_items(created_at);
";

/// A raw journal row as read from SQLite.
#[derive(Debug, Clone)]
pub struct MemoryRow {
    pub id: String,
    pub kind: String,
    pub content_json: String,
    pub tags_json: String,
    pub owner_id: String,
    pub importance: f64,
    pub merged_count: u32,
    pub created_at: String,
}
