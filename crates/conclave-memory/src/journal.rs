use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use conclave_models::memory_schema::MEMORY_TABLE_DDL;
use conclave_models::{MemoryItem, MemoryKind, MemoryRow};
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::MemoryError;

const INSERT_ITEM: &str = "INSERT OR REPLACE INTO memory_items \
     (id, kind, content_json, tags_json, owner_id, importance, merged_count, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// Durable append log behind the decision memory.
///
/// One row per memory item. Opened with WAL so a reader process can inspect
/// the journal while the engine writes to it.
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    /// Open (or create) the journal file and enable WAL.
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(MEMORY_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(MEMORY_TABLE_DDL)?;
        Ok(Self { conn })
    }

    pub fn append(&self, item: &MemoryItem) -> Result<(), MemoryError> {
        let row = item_to_row(item)?;
        let mut stmt = self.conn.prepare_cached(INSERT_ITEM)?;
        stmt.execute(rusqlite::params![
            row.id,
            row.kind,
            row.content_json,
            row.tags_json,
            row.owner_id,
            row.importance,
            row.merged_count,
            row.created_at,
        ])?;
        Ok(())
    }

    /// Delete `removed` and insert `inserted` in one transaction.
    pub fn replace(&mut self, removed: &[Uuid], inserted: &[MemoryItem]) -> Result<(), MemoryError> {
        let rows = inserted
            .iter()
            .map(item_to_row)
            .collect::<Result<Vec<_>, _>>()?;

        let tx = self.conn.transaction()?;
        {
            let mut delete = tx.prepare_cached("DELETE FROM memory_items WHERE id = ?1")?;
            for id in removed {
                delete.execute(rusqlite::params![id.to_string()])?;
            }

            let mut insert = tx.prepare_cached(INSERT_ITEM)?;
            for row in &rows {
                insert.execute(rusqlite::params![
                    row.id,
                    row.kind,
                    row.content_json,
                    row.tags_json,
                    row.owner_id,
                    row.importance,
                    row.merged_count,
                    row.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// The newest `limit` items, oldest first.
    pub fn load_recent(&self, limit: usize) -> Result<Vec<MemoryItem>, MemoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, kind, content_json, tags_json, owner_id, importance, merged_count, created_at \
             FROM memory_items ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok(MemoryRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    content_json: row.get(2)?,
                    tags_json: row.get(3)?,
                    owner_id: row.get(4)?,
                    importance: row.get(5)?,
                    merged_count: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut items = rows
            .into_iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>, _>>()?;
        items.reverse();
        Ok(items)
    }

    pub fn count(&self) -> Result<usize, MemoryError> {
        let count: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM memory_items", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Fixed-width nanosecond timestamps keep lexical and chronological order
/// identical and survive a reload unchanged.
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn item_to_row(item: &MemoryItem) -> Result<MemoryRow, MemoryError> {
    Ok(MemoryRow {
        id: item.id.to_string(),
        kind: item.kind.as_str().to_string(),
        content_json: serde_json::to_string(&item.content)?,
        tags_json: serde_json::to_string(&item.tags)?,
        owner_id: item.owner_id.to_string(),
        importance: item.importance,
        merged_count: item.merged_count,
        created_at: format_timestamp(&item.timestamp),
    })
}

fn row_to_item(row: MemoryRow) -> Result<MemoryItem, MemoryError> {
    let corrupt = |reason: String| MemoryError::Corrupt {
        id: row.id.clone(),
        reason,
    };

    let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(format!("id: {e}")))?;
    let owner_id =
        Uuid::parse_str(&row.owner_id).map_err(|e| corrupt(format!("owner_id: {e}")))?;
    let kind = MemoryKind::parse(&row.kind)
        .ok_or_else(|| corrupt(format!("unknown kind '{}'", row.kind)))?;
    let timestamp = DateTime::parse_from_rfc3339(&row.created_at)
        .map_err(|e| corrupt(format!("created_at: {e}")))?
        .with_timezone(&Utc);
    let content: serde_json::Value = serde_json::from_str(&row.content_json)?;
    let tags: BTreeSet<String> = serde_json::from_str(&row.tags_json)?;

    Ok(MemoryItem {
        id,
        kind,
        content,
        tags,
        timestamp,
        owner_id,
        importance: row.importance,
        merged_count: row.merged_count,
    })
}
