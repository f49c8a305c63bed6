//! HistoryStore implementation with JSONL append log and SQLite index.
//!
//! - **JSONL file**: append-only log of every imported event (source of truth)
//! - **SQLite database**: per-execution index for ordered loads and listings,
//!   rebuilt from the JSONL log when it falls behind
//!
//! Event ids are stored as SQLite INTEGER, so ids above `i64::MAX` are refused.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::error::{FlowlogError, Result};
use crate::history::source::decode_line;
use crate::history::{DegradedEvent, HistoryEvent, HistorySource, ensure_ordered};

/// Meta key holding how many JSONL lines the index covers
const INDEXED_LINES: &str = "indexed_lines";

/// One line of the JSONL log
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEvent {
    execution_id: String,
    event: HistoryEvent,
}

/// Listing entry for one stored execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub execution_id: String,
    pub event_count: usize,
    pub last_event_id: u64,
    pub last_event_time: DateTime<Utc>,
}

/// Persistent, append-only history store
pub struct HistoryStore {
    /// Path to the JSONL file
    jsonl_path: PathBuf,

    /// SQLite connection for queries; also serializes appends
    db: Mutex<Connection>,

    /// Log lines the last index rebuild could not decode
    skipped: Vec<DegradedEvent>,
}

fn to_sql_id(event_id: u64) -> Result<i64> {
    i64::try_from(event_id).map_err(|_| FlowlogError::Storage(format!("event id {} exceeds the index range", event_id)))
}

fn from_sql_int(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| FlowlogError::Storage(format!("negative {} in index: {}", what, value)))
}

impl HistoryStore {
    /// Open or create a store under `base_dir/.flowlog/`.
    pub fn open_at(base_dir: &Path) -> Result<Self> {
        let store_dir = base_dir.join(".flowlog");
        fs::create_dir_all(&store_dir)?;

        let jsonl_path = store_dir.join("history.jsonl");
        let db_path = store_dir.join("history.db");
        let mut db = Connection::open(&db_path)?;
        Self::init_schema(&db)?;
        let skipped = Self::rebuild_index_if_needed(&mut db, &jsonl_path)?;

        debug!("Opened history store at {}", store_dir.display());
        Ok(Self {
            jsonl_path,
            db: Mutex::new(db),
            skipped,
        })
    }

    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                execution_id TEXT NOT NULL,
                event_id INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                event_time TEXT NOT NULL,
                json_data TEXT NOT NULL,
                PRIMARY KEY (execution_id, event_id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|e| FlowlogError::Storage(format!("index lock poisoned: {}", e)))
    }

    fn indexed_lines(db: &Connection) -> Result<usize> {
        match db.query_row("SELECT value FROM meta WHERE key = ?1", [INDEXED_LINES], |row| {
            row.get::<_, i64>(0)
        }) {
            Ok(value) => Ok(from_sql_int(value, INDEXED_LINES)? as usize),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn set_indexed_lines(db: &Connection, lines: usize) -> Result<()> {
        db.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![INDEXED_LINES, lines as i64],
        )?;
        Ok(())
    }

    /// Rebuild the SQLite index when the JSONL log has lines it does not cover.
    fn rebuild_index_if_needed(db: &mut Connection, jsonl_path: &Path) -> Result<Vec<DegradedEvent>> {
        if !jsonl_path.exists() {
            return Ok(Vec::new());
        }
        let jsonl_lines = Self::count_jsonl_lines(jsonl_path)?;
        let indexed = Self::indexed_lines(db)?;
        if jsonl_lines > indexed {
            info!("Index covers {} of {} log lines, rebuilding", indexed, jsonl_lines);
            return Self::rebuild_index(db, jsonl_path);
        }
        Ok(Vec::new())
    }

    fn count_jsonl_lines(jsonl_path: &Path) -> Result<usize> {
        let reader = BufReader::new(File::open(jsonl_path)?);
        let mut count = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Rebuild the entire SQLite index from the JSONL file.
    ///
    /// Lines that do not decode are skipped and returned.
    fn rebuild_index(db: &mut Connection, jsonl_path: &Path) -> Result<Vec<DegradedEvent>> {
        let reader = BufReader::new(File::open(jsonl_path)?);
        let mut stored = Vec::new();
        let mut skipped = Vec::new();
        let mut lines = 0;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            lines += 1;
            match decode_line::<StoredEvent>(index + 1, &line) {
                Ok(entry) => stored.push(entry),
                Err(degraded) => skipped.push(degraded),
            }
        }

        let tx = db.transaction()?;
        tx.execute("DELETE FROM events", [])?;
        for entry in &stored {
            Self::insert_event(&tx, &entry.execution_id, &entry.event)?;
        }
        Self::set_indexed_lines(&tx, lines)?;
        tx.commit()?;

        if !skipped.is_empty() {
            warn!("Index rebuilt without {} undecodable log lines", skipped.len());
        }
        Ok(skipped)
    }

    fn insert_event(db: &Connection, execution_id: &str, event: &HistoryEvent) -> Result<()> {
        let event_type = serde_json::to_value(event.event_type)?;
        db.execute(
            r#"
            INSERT OR REPLACE INTO events
            (execution_id, event_id, event_type, event_time, json_data)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                execution_id,
                to_sql_id(event.event_id)?,
                event_type.as_str().unwrap_or("OTHER"),
                event.event_time.to_rfc3339(),
                serde_json::to_string(event)?,
            ],
        )?;
        Ok(())
    }

    fn max_event_id(db: &Connection, execution_id: &str) -> Result<Option<u64>> {
        let last: Option<i64> = db.query_row(
            "SELECT MAX(event_id) FROM events WHERE execution_id = ?1",
            [execution_id],
            |row| row.get(0),
        )?;
        last.map(|id| from_sql_int(id, "event id")).transpose()
    }

    /// Log lines the index rebuild at open time could not decode
    pub fn skipped(&self) -> &[DegradedEvent] {
        &self.skipped
    }

    /// Highest stored event id of an execution
    pub fn last_event_id(&self, execution_id: &str) -> Result<Option<u64>> {
        Self::max_event_id(&*self.conn()?, execution_id)
    }

    /// Append events to an execution's history.
    ///
    /// Events must be strictly increasing and follow anything already stored.
    /// The index lock is held from the order check through the commit.
    pub fn append(&self, execution_id: &str, events: &[HistoryEvent]) -> Result<usize> {
        ensure_ordered(events)?;
        let Some(first) = events.first() else {
            return Ok(0);
        };
        for event in events {
            to_sql_id(event.event_id)?;
        }

        let mut db = self.conn()?;
        if let Some(last) = Self::max_event_id(&db, execution_id)? {
            if first.event_id <= last {
                return Err(FlowlogError::OutOfOrder {
                    event_id: first.event_id,
                    previous: last,
                });
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.jsonl_path)?;
        for event in events {
            let line = serde_json::to_string(&StoredEvent {
                execution_id: execution_id.to_string(),
                event: event.clone(),
            })?;
            writeln!(file, "{}", line)?;
        }

        let tx = db.transaction()?;
        for event in events {
            Self::insert_event(&tx, execution_id, event)?;
        }
        let indexed = Self::indexed_lines(&tx)?;
        Self::set_indexed_lines(&tx, indexed + events.len())?;
        tx.commit()?;

        info!("Appended {} events to {}", events.len(), execution_id);
        Ok(events.len())
    }

    /// Load an execution's history ordered by event id.
    pub fn load(&self, execution_id: &str) -> Result<Vec<HistoryEvent>> {
        let db = self.conn()?;
        let mut stmt = db.prepare("SELECT json_data FROM events WHERE execution_id = ?1 ORDER BY event_id")?;
        let rows = stmt.query_map([execution_id], |row| {
            let json: String = row.get(0)?;
            Ok(json)
        })?;

        let mut events = Vec::new();
        for row in rows {
            let json = row?;
            events.push(serde_json::from_str::<HistoryEvent>(&json)?);
        }
        if events.is_empty() {
            return Err(FlowlogError::ExecutionNotFound(execution_id.to_string()));
        }
        Ok(events)
    }

    /// List stored executions with their sizes.
    pub fn executions(&self) -> Result<Vec<ExecutionEntry>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            r#"
            SELECT e.execution_id, COUNT(*), MAX(e.event_id),
                (SELECT event_time FROM events
                 WHERE execution_id = e.execution_id
                 ORDER BY event_id DESC LIMIT 1)
            FROM events e
            GROUP BY e.execution_id
            ORDER BY e.execution_id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let execution_id: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let last_id: i64 = row.get(2)?;
            let last_time: String = row.get(3)?;
            Ok((execution_id, count, last_id, last_time))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (execution_id, count, last_id, last_time) = row?;
            let last_event_time = DateTime::parse_from_rfc3339(&last_time)
                .map_err(|e| FlowlogError::Storage(format!("bad event_time for {}: {}", execution_id, e)))?
                .with_timezone(&Utc);
            entries.push(ExecutionEntry {
                execution_id,
                event_count: from_sql_int(count, "event count")? as usize,
                last_event_id: from_sql_int(last_id, "event id")?,
                last_event_time,
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl HistorySource for HistoryStore {
    async fn fetch_history(&self, execution_id: &str) -> Result<Vec<HistoryEvent>> {
        self.load(execution_id)
    }
}
