//! Account Repository
//! Mission: Create and read accounts; never mutate balances here
//!
//! Balance-affecting writes route through the engine. This module only
//! creates accounts (with their starting grant) and serves reads.

use crate::error::LedgerError;
use crate::ledger::db::{account_from_row, column_uuid, LedgerDb};
use crate::models::{Account, BalanceAdjustment, BalanceSummary};
use chrono::Utc;
use rusqlite::params;
use tracing::info;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str =
    "id, username, credential_hash, balance, starting_balance, created_at, updated_at";

impl LedgerDb {
    /// Register an account with its starting ticket grant.
    ///
    /// `credential_hash` is opaque material from the auth collaborator; it is
    /// stored verbatim and never inspected.
    pub async fn create_account(
        &self,
        username: &str,
        credential_hash: &str,
        starting_balance: i64,
    ) -> Result<Account, LedgerError> {
        if username.trim().is_empty() {
            return Err(LedgerError::invalid_wager("username cannot be empty"));
        }
        if starting_balance < 0 {
            return Err(LedgerError::invalid_wager(
                "starting balance cannot be negative",
            ));
        }

        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            credential_hash: credential_hash.to_string(),
            balance: starting_balance,
            starting_balance,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };

        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO accounts (id, username, credential_hash, balance, starting_balance, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    account.id.to_string(),
                    account.username,
                    account.credential_hash,
                    account.balance,
                    account.starting_balance,
                    account.created_at,
                    account.updated_at,
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(LedgerError::UsernameTaken(account.username.clone()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await?;

        info!(
            "✅ Created account: {} ({} tickets)",
            account.username, account.starting_balance
        );

        Ok(account)
    }

    /// Fetch an account by id.
    pub async fn get_account(&self, id: Uuid) -> Result<Account, LedgerError> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS),
                params![id.to_string()],
                account_from_row,
            );

            match result {
                Ok(account) => Ok(account),
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    Err(LedgerError::AccountNotFound(id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// Fetch an account by username.
    pub async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, LedgerError> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let result = conn.query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE username = ?1",
                    ACCOUNT_COLUMNS
                ),
                params![username],
                account_from_row,
            );

            match result {
                Ok(account) => Ok(Some(account)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// Admin corrections applied to one account, newest first.
    pub async fn list_adjustments_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<BalanceAdjustment>, LedgerError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, account_id, delta, reason, created_at FROM balance_adjustments
                 WHERE account_id = ?1 ORDER BY created_at DESC",
            )?;
            let adjustments = stmt
                .query_map(params![account_id.to_string()], |row| {
                    Ok(BalanceAdjustment {
                        id: column_uuid(row, 0)?,
                        account_id: column_uuid(row, 1)?,
                        delta: row.get(2)?,
                        reason: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(adjustments)
        })
        .await
    }

    /// Per-account balance overview, ordered by username (admin view).
    pub async fn list_balances(&self) -> Result<Vec<BalanceSummary>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, balance, updated_at FROM accounts ORDER BY username",
            )?;
            let summaries = stmt
                .query_map([], |row| {
                    Ok(BalanceSummary {
                        username: row.get(0)?,
                        balance: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(summaries)
        })
        .await
    }
}
