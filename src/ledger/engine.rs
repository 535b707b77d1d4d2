//! Ledger Engine
//! Mission: Debit, credit, and settle ticket balances with exactly-once semantics
//!
//! The engine is the sole writer of `accounts.balance` and `bets.status`.
//! Every operation runs inside one scoped transaction ([`LedgerDb::with_tx`]):
//! the balance read, the invariant check, and the paired writes either commit
//! together or leave no trace.
//!
//! # Invariants
//!
//! 1. A committed balance is never negative.
//! 2. A bet leaves `pending` at most once; the winning credit is applied
//!    exactly once, by whichever settle call wins the race.
//! 3. Per account: `starting_balance - Σ placed + Σ won credits + Σ
//!    adjustment deltas == balance` (checked by the reconciliation audit).

use crate::error::LedgerError;
use crate::ledger::db::{account_from_row, bet_from_row, LedgerDb, BET_COLUMNS};
use crate::models::{Account, Bet, BetStatus, PlacedBet, SettleOutcome, WagerSpec};
use chrono::Utc;
use rusqlite::params;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

/// Accepted deviation, in tickets, between the caller's `potential_winnings`
/// and `round(amount * odds)`. Absorbs the caller's rounding mode without
/// letting it forge an inflated payout.
const PAYOUT_TOLERANCE: i64 = 1;

/// Exposes `place_bet` and `settle_bet` (plus the admin balance adjustment)
/// over an explicitly injected [`LedgerDb`] handle.
#[derive(Clone)]
pub struct LedgerEngine {
    db: LedgerDb,
}

impl LedgerEngine {
    pub fn new(db: LedgerDb) -> Self {
        Self { db }
    }

    /// Atomically debit the account and record the pending bet.
    ///
    /// Fails with `InvalidWager` before touching the store when the terms are
    /// malformed, `AccountNotFound` / `InsufficientBalance` inside the
    /// transaction otherwise. On success both the debit and the bet row are
    /// committed together.
    ///
    /// Not idempotent: there is no client-supplied dedup key, so a caller-side
    /// retry of a timed-out call can place a second bet. Callers should retry
    /// only failures where [`LedgerError::is_retriable`] holds.
    pub async fn place_bet(
        &self,
        account_id: Uuid,
        spec: WagerSpec,
    ) -> Result<PlacedBet, LedgerError> {
        validate_wager(&spec)?;

        let bet_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let match_id = spec
            .match_id
            .clone()
            .unwrap_or_else(|| derive_match_id(&spec.match_payload));

        let placed = self
            .db
            .with_tx(move |conn| {
                let balance: i64 = match conn.query_row(
                    "SELECT balance FROM accounts WHERE id = ?1",
                    params![account_id.to_string()],
                    |row| row.get(0),
                ) {
                    Ok(balance) => balance,
                    Err(rusqlite::Error::QueryReturnedNoRows) => {
                        return Err(LedgerError::AccountNotFound(account_id))
                    }
                    Err(e) => return Err(e.into()),
                };

                if balance < spec.amount {
                    return Err(LedgerError::InsufficientBalance {
                        available: balance,
                        requested: spec.amount,
                    });
                }

                conn.execute(
                    "UPDATE accounts SET balance = balance - ?1, updated_at = ?2 WHERE id = ?3",
                    params![spec.amount, now, account_id.to_string()],
                )?;

                conn.execute(
                    "INSERT INTO bets (id, account_id, match_id, match_payload, outcome_code, \
                     outcome_label, amount, odds, potential_winnings, status, created_at, settled_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10, NULL)",
                    params![
                        bet_id.to_string(),
                        account_id.to_string(),
                        match_id,
                        spec.match_payload.to_string(),
                        spec.outcome_code,
                        spec.outcome_label,
                        spec.amount,
                        spec.odds,
                        spec.potential_winnings,
                        now,
                    ],
                )?;

                Ok(PlacedBet {
                    bet: Bet {
                        id: bet_id,
                        account_id,
                        match_id,
                        match_payload: spec.match_payload,
                        outcome_code: spec.outcome_code,
                        outcome_label: spec.outcome_label,
                        amount: spec.amount,
                        odds: spec.odds,
                        potential_winnings: spec.potential_winnings,
                        status: BetStatus::Pending,
                        created_at: now.clone(),
                        settled_at: None,
                    },
                    balance: balance - spec.amount,
                })
            })
            .await?;

        debug!(
            "🎟️ Bet {} placed: {} tickets on {} (balance {})",
            placed.bet.id, placed.bet.amount, placed.bet.match_id, placed.balance
        );

        Ok(placed)
    }

    /// Resolve a pending bet to `won` or `lost`, exactly once.
    ///
    /// The pending check runs inside the same transaction that flips the
    /// status, and the status write is additionally guarded with
    /// `WHERE status = 'pending'`: of any number of concurrent settles, one
    /// commits and the rest observe `BetAlreadySettled`. A win credits the
    /// `potential_winnings` locked at placement time; odds are not recomputed.
    pub async fn settle_bet(
        &self,
        bet_id: Uuid,
        outcome: SettleOutcome,
    ) -> Result<Bet, LedgerError> {
        let now = Utc::now().to_rfc3339();

        let bet = self
            .db
            .with_tx(move |conn| {
                let mut bet = match conn.query_row(
                    &format!("SELECT {} FROM bets WHERE id = ?1", BET_COLUMNS),
                    params![bet_id.to_string()],
                    bet_from_row,
                ) {
                    Ok(bet) => bet,
                    Err(rusqlite::Error::QueryReturnedNoRows) => {
                        return Err(LedgerError::BetNotFound(bet_id))
                    }
                    Err(e) => return Err(e.into()),
                };

                if bet.status.is_terminal() {
                    return Err(LedgerError::BetAlreadySettled { status: bet.status });
                }

                let status = outcome.status();
                let changes = conn.execute(
                    "UPDATE bets SET status = ?1, settled_at = ?2 WHERE id = ?3 AND status = 'pending'",
                    params![status.as_str(), now, bet_id.to_string()],
                )?;
                if changes == 0 {
                    // A concurrent settle won between our read and write;
                    // report the terminal status it left behind.
                    let current: String = conn.query_row(
                        "SELECT status FROM bets WHERE id = ?1",
                        params![bet_id.to_string()],
                        |row| row.get(0),
                    )?;
                    return Err(LedgerError::BetAlreadySettled {
                        status: BetStatus::from_str(&current).unwrap_or(bet.status),
                    });
                }

                if status == BetStatus::Won {
                    conn.execute(
                        "UPDATE accounts SET balance = balance + ?1, updated_at = ?2 WHERE id = ?3",
                        params![bet.potential_winnings, now, bet.account_id.to_string()],
                    )?;
                }

                bet.status = status;
                bet.settled_at = Some(now.clone());
                Ok(bet)
            })
            .await?;

        info!(
            "⚖️ Bet {} settled as {}{}",
            bet.id,
            bet.status,
            if bet.status == BetStatus::Won {
                format!(" (+{} tickets)", bet.potential_winnings)
            } else {
                String::new()
            }
        );

        Ok(bet)
    }

    /// Set an account's balance outright (admin correction).
    ///
    /// The signed delta is recorded as a `balance_adjustments` row in the
    /// same transaction, so the reconciliation audit stays conserved.
    pub async fn adjust_balance(
        &self,
        account_id: Uuid,
        new_balance: i64,
        reason: &str,
    ) -> Result<Account, LedgerError> {
        if new_balance < 0 {
            return Err(LedgerError::invalid_wager("ticket count cannot be negative"));
        }

        let now = Utc::now().to_rfc3339();
        let adjustment_id = Uuid::new_v4();
        let reason = reason.to_string();

        let account = self
            .db
            .with_tx(move |conn| {
                let mut account = match conn.query_row(
                    "SELECT id, username, credential_hash, balance, starting_balance, \
                     created_at, updated_at FROM accounts WHERE id = ?1",
                    params![account_id.to_string()],
                    account_from_row,
                ) {
                    Ok(account) => account,
                    Err(rusqlite::Error::QueryReturnedNoRows) => {
                        return Err(LedgerError::AccountNotFound(account_id))
                    }
                    Err(e) => return Err(e.into()),
                };

                let delta = new_balance - account.balance;

                conn.execute(
                    "UPDATE accounts SET balance = ?1, updated_at = ?2 WHERE id = ?3",
                    params![new_balance, now, account_id.to_string()],
                )?;
                conn.execute(
                    "INSERT INTO balance_adjustments (id, account_id, delta, reason, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        adjustment_id.to_string(),
                        account_id.to_string(),
                        delta,
                        reason,
                        now,
                    ],
                )?;

                account.balance = new_balance;
                account.updated_at = now.clone();
                Ok(account)
            })
            .await?;

        info!(
            "🛠️ Balance for {} set to {} tickets",
            account.username, account.balance
        );

        Ok(account)
    }

    pub fn db(&self) -> &LedgerDb {
        &self.db
    }
}

fn validate_wager(spec: &WagerSpec) -> Result<(), LedgerError> {
    if spec.amount <= 0 {
        return Err(LedgerError::invalid_wager(format!(
            "amount must be a positive ticket count, got {}",
            spec.amount
        )));
    }
    if !spec.odds.is_finite() || spec.odds <= 0.0 {
        return Err(LedgerError::invalid_wager(format!(
            "odds must be positive, got {}",
            spec.odds
        )));
    }
    if spec.potential_winnings <= 0 {
        return Err(LedgerError::invalid_wager(format!(
            "potential winnings must be positive, got {}",
            spec.potential_winnings
        )));
    }

    let expected = (spec.amount as f64 * spec.odds).round() as i64;
    if (spec.potential_winnings - expected).abs() > PAYOUT_TOLERANCE {
        return Err(LedgerError::invalid_wager(format!(
            "potential winnings {} inconsistent with {} tickets at odds {} (expected ~{})",
            spec.potential_winnings, spec.amount, spec.odds, expected
        )));
    }

    Ok(())
}

/// Event key for bets placed without one, in the shape the frontend always
/// used: `{away}_vs_{home}_{millis}`.
fn derive_match_id(payload: &Value) -> String {
    let away = payload
        .get("away_team")
        .and_then(Value::as_str)
        .unwrap_or("fight");
    let home = payload
        .get("home_team")
        .and_then(Value::as_str)
        .unwrap_or("fight");
    format!("{}_vs_{}_{}", away, home, Utc::now().timestamp_millis())
}
