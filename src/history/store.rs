//! SQLite-backed persistence for the audit log and the task registry.
//!
//! Both live in one database file (`~/.sentinel/sentinel.db` by default).
//! The connection sits behind a mutex, so every statement is serialized and
//! the one-shot undo claim is a single conditional `UPDATE`.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{ExecutionLogEntry, LogStatus, TaskRecord, TaskStatus};

/// Append-only storage for execution log entries
pub trait LogStore: Send + Sync {
    /// Persist an entry and return its row id
    fn insert(&self, entry: &ExecutionLogEntry) -> Result<i64, StoreError>;

    /// All entries of a task in chronological order
    fn entries_for(&self, task_id: &str) -> Result<Vec<ExecutionLogEntry>, StoreError>;

    /// Entries of a task with the given status, chronological
    fn entries_with_status(
        &self,
        task_id: &str,
        status: LogStatus,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError>;
}

/// Task records and their one-shot undo flag
pub trait TaskRegistry: Send + Sync {
    /// Insert a task. Returns `false` (and changes nothing) if it exists.
    fn register(&self, task: &TaskRecord) -> Result<bool, StoreError>;

    fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// Returns `false` for an unknown task
    fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, StoreError>;

    /// Atomically flip `undo_available` from true to false.
    ///
    /// Exactly one caller wins; everyone else (and unknown tasks) gets
    /// `false`.
    fn claim_undo(&self, task_id: &str) -> Result<bool, StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent folders
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened sentinel database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS execution_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                action_type TEXT NOT NULL,
                source_path TEXT NOT NULL,
                destination_path TEXT,
                status TEXT NOT NULL,
                error_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_logs_task
                ON execution_logs(task_id, timestamp);

            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                user_prompt TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                status TEXT NOT NULL,
                undo_available INTEGER NOT NULL DEFAULT 1
            );
        "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query_entries<P: Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map(params, entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

const ENTRY_COLUMNS: &str = "id, task_id, timestamp, action_type, source_path, \
                             destination_path, status, error_message";

impl LogStore for SqliteStore {
    fn insert(&self, entry: &ExecutionLogEntry) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO execution_logs
                (task_id, timestamp, action_type, source_path, destination_path, status, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.task_id,
                format_timestamp(&entry.timestamp),
                entry.action_type.as_str(),
                path_to_sql(&entry.source_path),
                entry.destination_path.as_deref().map(path_to_sql),
                entry.status.as_str(),
                entry.error_message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn entries_for(&self, task_id: &str) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM execution_logs WHERE task_id = ?1 ORDER BY timestamp ASC, id ASC",
            ENTRY_COLUMNS
        );
        self.query_entries(&sql, params![task_id])
    }

    fn entries_with_status(
        &self,
        task_id: &str,
        status: LogStatus,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM execution_logs WHERE task_id = ?1 AND status = ?2 \
             ORDER BY timestamp ASC, id ASC",
            ENTRY_COLUMNS
        );
        self.query_entries(&sql, params![task_id, status.as_str()])
    }
}

impl TaskRegistry for SqliteStore {
    fn register(&self, task: &TaskRecord) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO tasks (task_id, user_prompt, created_at, status, undo_available)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(task_id) DO NOTHING",
            params![
                task.task_id,
                task.user_prompt,
                format_timestamp(&task.created_at),
                task.status.as_str(),
                task.undo_available,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        let conn = self.lock()?;
        let task = conn
            .query_row(
                "SELECT task_id, user_prompt, created_at, status, undo_available
                 FROM tasks WHERE task_id = ?1",
                params![task_id],
                |row| {
                    Ok(TaskRecord {
                        task_id: row.get(0)?,
                        user_prompt: row.get(1)?,
                        created_at: parse_timestamp(row, 2)?,
                        status: parse_column(row, 3)?,
                        undo_available: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(task)
    }

    fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE tasks SET status = ?2 WHERE task_id = ?1",
            params![task_id, status.as_str()],
        )?;
        Ok(updated == 1)
    }

    fn claim_undo(&self, task_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE tasks SET undo_available = 0 WHERE task_id = ?1 AND undo_available = 1",
            params![task_id],
        )?;
        Ok(updated == 1)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionLogEntry> {
    let source = path_from_sql(row, 4)?
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(4, "source_path".into(), Type::Null))?;
    Ok(ExecutionLogEntry {
        id: Some(row.get(0)?),
        task_id: row.get(1)?,
        timestamp: parse_timestamp(row, 2)?,
        action_type: parse_column(row, 3)?,
        source_path: source,
        destination_path: path_from_sql(row, 5)?,
        status: parse_column(row, 6)?,
        error_message: row.get(7)?,
    })
}

// Fixed-width nanosecond RFC 3339 so that text order is time order
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// UTF-8 paths are stored as TEXT; anything else as a BLOB of the
// platform's native encoding so it round-trips exactly
fn path_to_sql(path: &Path) -> Value {
    match path.to_str() {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Blob(os_str_to_bytes(path.as_os_str())),
    }
}

fn path_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<PathBuf>> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|text| Some(PathBuf::from(text)))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        ValueRef::Blob(bytes) => os_string_from_bytes(bytes)
            .map(|os| Some(PathBuf::from(os)))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, e.into())),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "path".into(),
            other.data_type(),
        )),
    }
}

#[cfg(unix)]
fn os_str_to_bytes(os: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    os.as_bytes().to_vec()
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: &[u8]) -> Result<OsString, String> {
    use std::os::unix::ffi::OsStringExt;
    Ok(OsString::from_vec(bytes.to_vec()))
}

// UTF-16 code units, little endian
#[cfg(windows)]
fn os_str_to_bytes(os: &OsStr) -> Vec<u8> {
    use std::os::windows::ffi::OsStrExt;
    os.encode_wide().flat_map(u16::to_le_bytes).collect()
}

#[cfg(windows)]
fn os_string_from_bytes(bytes: &[u8]) -> Result<OsString, String> {
    use std::os::windows::ffi::OsStringExt;
    if bytes.len() % 2 != 0 {
        return Err(format!("Odd-length UTF-16 path ({} bytes)", bytes.len()));
    }
    let wide: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(OsString::from_wide(&wide))
}

#[cfg(not(any(unix, windows)))]
fn os_str_to_bytes(os: &OsStr) -> Vec<u8> {
    os.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(any(unix, windows)))]
fn os_string_from_bytes(bytes: &[u8]) -> Result<OsString, String> {
    String::from_utf8(bytes.to_vec())
        .map(OsString::from)
        .map_err(|e| e.to_string())
}
