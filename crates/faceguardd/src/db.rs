//! SQLite-backed event log and resident directory.
//!
//! One database file holds both tables. The worker and D-Bus handlers talk
//! to the [`EventSink`] and [`ResidentDirectory`] traits so tests can swap
//! in in-memory fakes.

use chrono::Utc;
use faceguard_core::types::safe_label;
use faceguard_core::GateStatus;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database mutex poisoned")]
    Poisoned,
}

/// A recognition event as stored.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: i64,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    pub name: String,
    pub status: GateStatus,
    pub confidence: f64,
    /// Snapshot filename under `snapshots/`, for rejected visitors.
    pub snapshot: Option<String>,
}

/// A recognition event about to be stored.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub status: GateStatus,
    pub confidence: f64,
    pub snapshot: Option<String>,
}

pub trait EventSink: Send + Sync {
    fn append(&self, event: NewEvent) -> Result<i64, StoreError>;
    /// Newest first; ties on timestamp break toward the higher id.
    fn list_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StoreError>;
    fn get_by_id(&self, id: i64) -> Result<Option<EventRecord>, StoreError>;
}

pub trait ResidentDirectory: Send + Sync {
    /// Dataset label -> registered display name.
    fn display_names(&self) -> Result<HashMap<String, String>, StoreError>;
    /// Record a display name. Idempotent.
    fn register(&self, name: &str) -> Result<(), StoreError>;
}

/// The production store: one `rusqlite` connection behind a mutex.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS residents (
                 id   INTEGER PRIMARY KEY AUTOINCREMENT,
                 name TEXT NOT NULL UNIQUE
             );
             CREATE TABLE IF NOT EXISTS events (
                 id         INTEGER PRIMARY KEY AUTOINCREMENT,
                 timestamp  TEXT NOT NULL,
                 name       TEXT NOT NULL,
                 status     TEXT NOT NULL,
                 confidence REAL NOT NULL,
                 snapshot   TEXT
             );",
        )?;
        Ok(())
    }

}

impl EventSink for Database {
    fn append(&self, event: NewEvent) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO events (timestamp, name, status, confidence, snapshot)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Utc::now().to_rfc3339(),
                event.name,
                event.status.to_string(),
                event.confidence,
                event.snapshot,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, name, status, confidence, snapshot
             FROM events ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_event)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<EventRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let record = conn
            .query_row(
                "SELECT id, timestamp, name, status, confidence, snapshot
                 FROM events WHERE id = ?1",
                params![id],
                row_to_event,
            )
            .optional()?;
        Ok(record)
    }
}

impl ResidentDirectory for Database {
    fn register(&self, name: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT OR IGNORE INTO residents (name) VALUES (?1)",
            params![name],
        )?;
        Ok(())
    }

    fn display_names(&self) -> Result<HashMap<String, String>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT name FROM residents")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut map = HashMap::new();
        for name in names {
            let name = name?;
            map.insert(safe_label(&name), name);
        }
        Ok(map)
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
    let status: String = row.get(3)?;
    Ok(EventRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        name: row.get(2)?,
        status: status.parse().unwrap_or(GateStatus::Ditolak),
        confidence: row.get(4)?,
        snapshot: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, status: GateStatus) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            status,
            confidence: 42.0,
            snapshot: None,
        }
    }

    #[test]
    fn test_append_and_get() {
        let db = Database::open_in_memory().unwrap();
        let id = db.append(event("Budi", GateStatus::Masuk)).unwrap();
        let got = db.get_by_id(id).unwrap().unwrap();
        assert_eq!(got.name, "Budi");
        assert_eq!(got.status, GateStatus::Masuk);
        assert!(got.snapshot.is_none());
        assert!(db.get_by_id(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_list_recent_newest_first() {
        let db = Database::open_in_memory().unwrap();
        // Same-second inserts: the id must break the tie, newest last in.
        for i in 0..5 {
            db.append(event(&format!("p{i}"), GateStatus::Ditolak)).unwrap();
        }
        let recent = db.list_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].name, "p4");
        assert_eq!(recent[1].name, "p3");
        assert_eq!(recent[2].name, "p2");
    }

    #[test]
    fn test_snapshot_column_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .append(NewEvent {
                snapshot: Some("20250101_080000_Unknown.jpg".into()),
                ..event("Unknown", GateStatus::Ditolak)
            })
            .unwrap();
        let got = db.get_by_id(id).unwrap().unwrap();
        assert_eq!(got.snapshot.as_deref(), Some("20250101_080000_Unknown.jpg"));
    }

    #[test]
    fn test_display_names_keyed_by_label() {
        let db = Database::open_in_memory().unwrap();
        db.register("Budi Santoso").unwrap();
        db.register("Ana").unwrap();
        db.register("Budi Santoso").unwrap(); // idempotent

        let names = db.display_names().unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names["Budi_Santoso"], "Budi Santoso");
        assert_eq!(names["Ana"], "Ana");
    }
}
