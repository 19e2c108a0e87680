//! Relational store.
//!
//! A single SQLite connection behind a mutex. Every query runs on the
//! blocking pool so async handlers never hold the lock across an await.
//! Repository traits in [`repository`] describe the operations; the SQL
//! lives in [`journal`] and [`accounts`].

pub mod accounts;
pub mod journal;
pub mod repository;
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use rusqlite::types::Type;

pub use repository::{
    DocumentRepository, GoalRecord, GoalRepository, InterviewRecord, InterviewRepository,
    ReviewFilter, ReviewRecord, ReviewRepository, SubscriptionRepository, SubscriptionUpsert,
    UploadRepository, UserRecord, UserRepository,
};

/// Path value that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Handle to the SQLite store. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    path: String,
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema.
    /// `:memory:` opens a private in-memory database.
    pub async fn open(path: &str) -> Result<Self> {
        let owned = path.to_string();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = if owned == IN_MEMORY {
                Connection::open_in_memory().context("Failed to open in-memory database")?
            } else {
                if let Some(parent) = Path::new(&owned).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).with_context(|| {
                            format!("Failed to create database directory {}", parent.display())
                        })?;
                    }
                }
                let conn = Connection::open(&owned)
                    .with_context(|| format!("Failed to open database at {owned}"))?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn
            };
            conn.pragma_update(None, "foreign_keys", "ON")?;
            schema::apply(&conn)?;
            Ok(conn)
        })
        .await
        .context("Tokio spawn_blocking failed")??;

        Ok(Self {
            path: path.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a fresh in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::open(IN_MEMORY).await
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `f` with the connection on the blocking pool.
    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .context("Tokio spawn_blocking failed")?
    }

    /// Cheap liveness probe used by the readiness endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.call(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

/// Format a timestamp for storage. Fixed precision keeps text ordering
/// identical to time ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to storage precision.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    parse_timestamp(&format_timestamp(&now)).unwrap_or(now)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Read an RFC 3339 timestamp column.
pub(crate) fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_timestamp_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        parse_timestamp(&value)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a `YYYY-MM-DD` column.
pub(crate) fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a string-backed kind column.
pub(crate) fn kind_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::from(e))
    })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_and_ping() {
        let db = Database::in_memory().await.unwrap();
        db.ping().await.unwrap();
        assert_eq!(db.path(), IN_MEMORY);
    }

    #[tokio::test]
    async fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("journal.sqlite");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.ping().await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_timestamp_format_round_trips() {
        let ts = now();
        assert_eq!(parse_timestamp(&format_timestamp(&ts)).unwrap(), ts);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
