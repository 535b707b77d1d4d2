//! Reconciliation Audit
//! Mission: Re-derive every balance from history and flag any drift
//!
//! The conserved quantity per account is
//! `starting_balance - Σ bet amounts + Σ won winnings + Σ adjustment deltas`.
//! The engine maintains it transactionally; this module recomputes it from
//! the raw tables so an operator can prove the ledger never lost or invented
//! tickets. Read-only, and run inside one transaction so the snapshot is
//! consistent even while bets are being placed.

use crate::error::LedgerError;
use crate::ledger::db::LedgerDb;
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of reconciling one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountReconciliation {
    pub account_id: Uuid,
    pub username: String,
    pub starting_balance: i64,
    /// Tickets debited by every bet ever placed.
    pub total_wagered: i64,
    /// Tickets credited by bets settled as won.
    pub total_credited: i64,
    /// Net of admin adjustments.
    pub total_adjusted: i64,
    pub expected_balance: i64,
    pub actual_balance: i64,
}

impl AccountReconciliation {
    pub fn difference(&self) -> i64 {
        self.actual_balance - self.expected_balance
    }

    /// True when the balance matches its history and is non-negative.
    pub fn balanced(&self) -> bool {
        self.difference() == 0 && self.actual_balance >= 0
    }
}

/// Reconcile a single account.
pub async fn reconcile_account(
    db: &LedgerDb,
    account_id: Uuid,
) -> Result<AccountReconciliation, LedgerError> {
    db.with_tx(move |conn| {
        let row = match conn.query_row(
            "SELECT id, username, balance, starting_balance FROM accounts WHERE id = ?1",
            params![account_id.to_string()],
            account_header,
        ) {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(LedgerError::AccountNotFound(account_id))
            }
            Err(e) => return Err(e.into()),
        };
        reconcile_row(conn, row)
    })
    .await
}

/// Reconcile every account on the ledger, ordered by username.
pub async fn reconcile_all(db: &LedgerDb) -> Result<Vec<AccountReconciliation>, LedgerError> {
    db.with_tx(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, username, balance, starting_balance FROM accounts ORDER BY username",
        )?;
        let headers = stmt
            .query_map([], account_header)?
            .collect::<Result<Vec<_>, _>>()?;

        headers
            .into_iter()
            .map(|row| reconcile_row(conn, row))
            .collect()
    })
    .await
}

struct AccountHeader {
    id: Uuid,
    username: String,
    balance: i64,
    starting_balance: i64,
}

fn account_header(row: &rusqlite::Row) -> rusqlite::Result<AccountHeader> {
    let raw: String = row.get(0)?;
    let id = Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(AccountHeader {
        id,
        username: row.get(1)?,
        balance: row.get(2)?,
        starting_balance: row.get(3)?,
    })
}

fn reconcile_row(
    conn: &Connection,
    header: AccountHeader,
) -> Result<AccountReconciliation, LedgerError> {
    let id = header.id.to_string();

    let total_wagered: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM bets WHERE account_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let total_credited: i64 = conn.query_row(
        "SELECT COALESCE(SUM(potential_winnings), 0) FROM bets
         WHERE account_id = ?1 AND status = 'won'",
        params![id],
        |row| row.get(0),
    )?;
    let total_adjusted: i64 = conn.query_row(
        "SELECT COALESCE(SUM(delta), 0) FROM balance_adjustments WHERE account_id = ?1",
        params![id],
        |row| row.get(0),
    )?;

    let expected_balance =
        header.starting_balance - total_wagered + total_credited + total_adjusted;

    Ok(AccountReconciliation {
        account_id: header.id,
        username: header.username,
        starting_balance: header.starting_balance,
        total_wagered,
        total_credited,
        total_adjusted,
        expected_balance,
        actual_balance: header.balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::engine::LedgerEngine;
    use crate::models::{SettleOutcome, WagerSpec};
    use rusqlite::params;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn create_test_engine() -> (LedgerEngine, LedgerDb, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db = LedgerDb::open(temp_file.path().to_str().unwrap()).unwrap();
        (LedgerEngine::new(db.clone()), db, temp_file)
    }

    fn wager(amount: i64) -> WagerSpec {
        WagerSpec {
            match_id: Some("jets_vs_sharks".to_string()),
            match_payload: json!({}),
            outcome_code: "1".to_string(),
            outcome_label: "Jets win".to_string(),
            amount,
            odds: 2.0,
            potential_winnings: amount * 2,
        }
    }

    #[tokio::test]
    async fn test_mixed_activity_reconciles() {
        let (engine, db, _temp) = create_test_engine();
        let account = db.create_account("luca", "hash", 255).await.unwrap();

        let won = engine.place_bet(account.id, wager(30)).await.unwrap();
        let lost = engine.place_bet(account.id, wager(20)).await.unwrap();
        engine.place_bet(account.id, wager(10)).await.unwrap(); // stays pending
        engine.settle_bet(won.bet.id, SettleOutcome::Won).await.unwrap();
        engine.settle_bet(lost.bet.id, SettleOutcome::Lost).await.unwrap();
        engine
            .adjust_balance(account.id, 300, "top-up")
            .await
            .unwrap();

        let report = reconcile_account(&db, account.id).await.unwrap();
        assert!(report.balanced());
        assert_eq!(report.total_wagered, 60);
        assert_eq!(report.total_credited, 60);
        assert_eq!(report.actual_balance, 300);
        // 255 - 60 + 60 + adjustment(300 - 255) == 300
        assert_eq!(report.total_adjusted, 45);
    }

    #[tokio::test]
    async fn test_out_of_band_write_is_flagged() {
        let (engine, db, _temp) = create_test_engine();
        let account = db.create_account("luca", "hash", 100).await.unwrap();
        engine.place_bet(account.id, wager(30)).await.unwrap();

        // Corrupt the balance behind the engine's back.
        db.with_tx(|conn| {
            conn.execute(
                "UPDATE accounts SET balance = balance + 999 WHERE id = ?1",
                params![account.id.to_string()],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let report = reconcile_account(&db, account.id).await.unwrap();
        assert!(!report.balanced());
        assert_eq!(report.difference(), 999);
    }

    #[tokio::test]
    async fn test_reconcile_all_covers_every_account() {
        let (engine, db, _temp) = create_test_engine();
        let a = db.create_account("evvortex", "hash", 278).await.unwrap();
        let b = db.create_account("roby56", "hash", 176).await.unwrap();
        engine.place_bet(a.id, wager(50)).await.unwrap();
        engine.place_bet(b.id, wager(25)).await.unwrap();

        let reports = reconcile_all(&db).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.balanced()));
        assert_eq!(reports[0].username, "evvortex");
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (_engine, db, _temp) = create_test_engine();
        let missing = Uuid::new_v4();
        assert!(matches!(
            reconcile_account(&db, missing).await,
            Err(LedgerError::AccountNotFound(id)) if id == missing
        ));
    }
}
