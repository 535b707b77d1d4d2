//! Ledger Store
//! Mission: Durable SQLite storage for accounts, bets, and adjustments
//!
//! All balance-affecting writes run through [`LedgerDb::with_tx`], a single
//! scoped-transaction primitive: `BEGIN IMMEDIATE` takes SQLite's writer lock
//! for the whole read-modify-write, the body runs synchronously, and the
//! transaction commits on success or rolls back on any error path. The
//! in-process mutex is only held for that synchronous body, never across an
//! await point; cross-process exclusion is the database's writer lock, so
//! several server instances can share one ledger file.

use crate::error::LedgerError;
use crate::models::{Account, Bet, BetStatus};
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Ledger schema. WAL keeps readers unblocked during settlement bursts; the
/// busy timeout bounds how long a writer waits for the lock before the
/// operation is reported as unavailable.
const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    credential_hash TEXT NOT NULL,
    balance INTEGER NOT NULL CHECK (balance >= 0),
    starting_balance INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bets (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    match_id TEXT NOT NULL,
    match_payload TEXT NOT NULL,
    outcome_code TEXT NOT NULL,
    outcome_label TEXT NOT NULL,
    amount INTEGER NOT NULL,
    odds REAL NOT NULL,
    potential_winnings INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    settled_at TEXT,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE INDEX IF NOT EXISTS idx_bets_account_created
    ON bets(account_id, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_bets_status
    ON bets(status, created_at DESC);

CREATE TABLE IF NOT EXISTS balance_adjustments (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    delta INTEGER NOT NULL,
    reason TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE INDEX IF NOT EXISTS idx_adjustments_account
    ON balance_adjustments(account_id, created_at DESC);
"#;

/// Handle to the ledger database. Cheap to clone; created once at startup and
/// passed explicitly to the engine and repositories.
#[derive(Clone)]
pub struct LedgerDb {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerDb {
    /// Open (or create) the ledger database and apply the schema.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open ledger database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize ledger schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let accounts: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .unwrap_or(0);
        let pending: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bets WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        info!("🎟️ Ticket ledger ready at: {}", db_path);
        info!("👥 Accounts: {} | Pending bets: {}", accounts, pending);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `body` inside a single write transaction.
    ///
    /// `BEGIN IMMEDIATE` acquires the writer lock up front, so every read in
    /// the body observes the committed state no concurrent writer can change
    /// underneath it. Commits when the body returns `Ok`, rolls back on every
    /// `Err` - the caller never sees a partial write.
    pub(crate) async fn with_tx<T, F>(&self, body: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError>,
    {
        let conn = self.conn.lock().await;
        conn.execute("BEGIN IMMEDIATE", [])?;

        match body(&conn) {
            Ok(value) => match conn.execute("COMMIT", []) {
                Ok(_) => Ok(value),
                Err(commit_err) => {
                    // Leave no transaction open on this connection.
                    if let Err(rollback_err) = conn.execute("ROLLBACK", []) {
                        error!("Rollback failed after commit error: {}", rollback_err);
                    }
                    Err(commit_err.into())
                }
            },
            Err(err) => {
                if let Err(rollback_err) = conn.execute("ROLLBACK", []) {
                    error!("Rollback failed after ledger error: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Run `body` against the connection without opening a transaction.
    /// For single-statement reads only.
    pub(crate) async fn with_conn<T, F>(&self, body: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError>,
    {
        let conn = self.conn.lock().await;
        body(&conn)
    }
}

pub(crate) fn column_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a `SELECT id, username, credential_hash, balance, starting_balance,
/// created_at, updated_at` row.
pub(crate) fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: column_uuid(row, 0)?,
        username: row.get(1)?,
        credential_hash: row.get(2)?,
        balance: row.get(3)?,
        starting_balance: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) const BET_COLUMNS: &str = "id, account_id, match_id, match_payload, outcome_code, \
     outcome_label, amount, odds, potential_winnings, status, created_at, settled_at";

/// Map a row selected with [`BET_COLUMNS`].
pub(crate) fn bet_from_row(row: &Row) -> rusqlite::Result<Bet> {
    let payload_raw: String = row.get(3)?;
    let match_payload = serde_json::from_str(&payload_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    let status_raw: String = row.get(9)?;
    let status = BetStatus::from_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            Type::Text,
            format!("unknown bet status: {}", status_raw).into(),
        )
    })?;

    Ok(Bet {
        id: column_uuid(row, 0)?,
        account_id: column_uuid(row, 1)?,
        match_id: row.get(2)?,
        match_payload,
        outcome_code: row.get(4)?,
        outcome_label: row.get(5)?,
        amount: row.get(6)?,
        odds: row.get(7)?,
        potential_winnings: row.get(8)?,
        status,
        created_at: row.get(10)?,
        settled_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (LedgerDb, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db = LedgerDb::open(temp_file.path().to_str().unwrap()).unwrap();
        (db, temp_file)
    }

    async fn seed_account(db: &LedgerDb, username: &str, balance: i64) -> Uuid {
        let account = db
            .create_account(username, "hash", balance)
            .await
            .unwrap();
        account.id
    }

    #[tokio::test]
    async fn test_commit_makes_both_writes_visible() {
        let (db, _temp) = create_test_db();
        let account_id = seed_account(&db, "luca", 100).await;

        db.with_tx(|conn| {
            conn.execute(
                "UPDATE accounts SET balance = balance - 40 WHERE id = ?1",
                params![account_id.to_string()],
            )?;
            conn.execute(
                "INSERT INTO balance_adjustments (id, account_id, delta, reason, created_at)
                 VALUES (?1, ?2, -40, 'test', '2025-01-01T00:00:00+00:00')",
                params![Uuid::new_v4().to_string(), account_id.to_string()],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let account = db.get_account(account_id).await.unwrap();
        assert_eq!(account.balance, 60);
    }

    #[tokio::test]
    async fn test_error_rolls_back_every_write() {
        let (db, _temp) = create_test_db();
        let account_id = seed_account(&db, "luca", 100).await;

        // Debit succeeds, then the body fails before the paired insert. The
        // committed state must show neither write.
        let result: Result<(), LedgerError> = db
            .with_tx(|conn| {
                conn.execute(
                    "UPDATE accounts SET balance = balance - 40 WHERE id = ?1",
                    params![account_id.to_string()],
                )?;
                Err(LedgerError::invalid_wager("injected failure"))
            })
            .await;

        assert!(matches!(result, Err(LedgerError::InvalidWager { .. })));
        let account = db.get_account(account_id).await.unwrap();
        assert_eq!(account.balance, 100);
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back() {
        let (db, _temp) = create_test_db();
        let account_id = seed_account(&db, "luca", 100).await;

        // Duplicate primary key forces a constraint failure mid-transaction.
        let dup = Uuid::new_v4();
        let result: Result<(), LedgerError> = db
            .with_tx(|conn| {
                conn.execute(
                    "UPDATE accounts SET balance = balance - 10 WHERE id = ?1",
                    params![account_id.to_string()],
                )?;
                for _ in 0..2 {
                    conn.execute(
                        "INSERT INTO balance_adjustments (id, account_id, delta, reason, created_at)
                         VALUES (?1, ?2, -10, 'dup', '2025-01-01T00:00:00+00:00')",
                        params![dup.to_string(), account_id.to_string()],
                    )?;
                }
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        let account = db.get_account(account_id).await.unwrap();
        assert_eq!(account.balance, 100);
    }

    #[tokio::test]
    async fn test_reopen_preserves_state() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        {
            let db = LedgerDb::open(&path).unwrap();
            db.create_account("razgab", "hash", 226).await.unwrap();
        }

        let db = LedgerDb::open(&path).unwrap();
        let account = db.get_account_by_username("razgab").await.unwrap();
        assert_eq!(account.unwrap().balance, 226);
    }
}
