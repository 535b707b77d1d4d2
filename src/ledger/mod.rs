//! Ticket-balance and bet-settlement ledger.
//!
//! `db` owns durable storage and the scoped-transaction primitive, `engine`
//! is the sole writer of balances and bet statuses, `accounts`/`bets` are the
//! thin read-side repositories, and `audit` re-derives balances for
//! reconciliation.

pub mod accounts;
pub mod audit;
pub mod bets;
pub mod db;
pub mod engine;
