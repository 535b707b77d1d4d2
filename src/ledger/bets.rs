//! Bet Repository
//! Mission: Read-side queries over placed bets

use crate::error::LedgerError;
use crate::ledger::db::{bet_from_row, LedgerDb, BET_COLUMNS};
use crate::models::Bet;
use rusqlite::params;
use uuid::Uuid;

impl LedgerDb {
    /// Fetch a bet by id.
    pub async fn get_bet(&self, id: Uuid) -> Result<Bet, LedgerError> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                &format!("SELECT {} FROM bets WHERE id = ?1", BET_COLUMNS),
                params![id.to_string()],
                bet_from_row,
            );

            match result {
                Ok(bet) => Ok(bet),
                Err(rusqlite::Error::QueryReturnedNoRows) => Err(LedgerError::BetNotFound(id)),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// All bets for one account, newest first.
    pub async fn list_bets_for_account(&self, account_id: Uuid) -> Result<Vec<Bet>, LedgerError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM bets WHERE account_id = ?1 ORDER BY created_at DESC",
                BET_COLUMNS
            ))?;
            let bets = stmt
                .query_map(params![account_id.to_string()], bet_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(bets)
        })
        .await
    }

    /// Every bet on the ledger, newest first (admin view).
    pub async fn list_all_bets(&self) -> Result<Vec<Bet>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM bets ORDER BY created_at DESC",
                BET_COLUMNS
            ))?;
            let bets = stmt
                .query_map([], bet_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(bets)
        })
        .await
    }
}
