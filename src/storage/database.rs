//! SQLite Database
//!
//! Embedded state store using rusqlite with r2d2 connection pooling.
//! Holds the single live state record per account plus the append-only
//! attempt history that feeds the activity summary.

use std::path::Path;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::models::account::{AccountState, AttemptOutcome, AttemptRecord};
use crate::utils::error::{AppError, AppResult};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database instance with connection pooling
    pub fn new(db_path: &Path) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Create an in-memory database for testing.
    ///
    /// Pool size must stay at 1: every in-memory SQLite connection sees its
    /// own private database.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS account_states (
                account_id TEXT PRIMARY KEY,
                last_status TEXT,
                updated_at TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS attempt_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                outcome TEXT NOT NULL,
                status TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_account
             ON attempt_history(account_id, timestamp)",
            [],
        )?;

        Ok(())
    }

    /// Last confirmed status for an account, or `None` if the account has
    /// never been successfully observed.
    pub fn previous_status(&self, account_id: &str) -> AppResult<Option<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT last_status FROM account_states WHERE account_id = ?1")?;
        let mut rows = stmt.query(params![account_id])?;
        match rows.next()? {
            Some(row) => Ok(row.get::<_, Option<String>>(0)?),
            None => Ok(None),
        }
    }

    /// The full live state record for an account.
    pub fn account_state(&self, account_id: &str) -> AppResult<Option<AccountState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, last_status, updated_at
             FROM account_states WHERE account_id = ?1",
        )?;
        let mut rows = stmt.query(params![account_id])?;
        match rows.next()? {
            Some(row) => {
                let updated_at: Option<String> = row.get(2)?;
                Ok(Some(AccountState {
                    account_id: row.get(0)?,
                    last_status: row.get(1)?,
                    last_updated: updated_at.as_deref().map(parse_timestamp).transpose()?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the live state record for an account with a newly
    /// confirmed status.
    pub fn record_status(&self, account_id: &str, status: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO account_states (account_id, last_status, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (account_id)
             DO UPDATE SET last_status = excluded.last_status,
                           updated_at = excluded.updated_at",
            params![account_id, status, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Append one attempt record to an account's history. Records are never
    /// mutated or deleted afterwards.
    pub fn append_attempt(&self, record: &AttemptRecord) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO attempt_history (account_id, timestamp, outcome, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.account_id,
                record.timestamp.to_rfc3339(),
                record.outcome.to_string(),
                record.status,
            ],
        )?;
        Ok(())
    }

    /// Attempt records for an account with timestamp >= `since`, in
    /// chronological order.
    pub fn history_since(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<AttemptRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, timestamp, outcome, status
             FROM attempt_history
             WHERE account_id = ?1 AND timestamp >= ?2
             ORDER BY timestamp ASC, id ASC",
        )?;

        let mut rows = stmt.query(params![account_id, since.to_rfc3339()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let timestamp: String = row.get(1)?;
            let outcome: String = row.get(2)?;
            records.push(AttemptRecord {
                account_id: row.get(0)?,
                timestamp: parse_timestamp(&timestamp)?,
                outcome: AttemptOutcome::from_str_value(&outcome).ok_or_else(|| {
                    AppError::database(format!("unknown attempt outcome: {}", outcome))
                })?,
                status: row.get(3)?,
            });
        }
        Ok(records)
    }
}

fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("invalid timestamp '{}': {}", raw, e)))
}
