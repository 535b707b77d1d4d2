//! Karuta Ticket Ledger Backend
//!
//! Exposes the ticket-balance and bet-settlement ledger: accounts hold a
//! ticket balance, `place_bet` debits it atomically with the bet insert, and
//! `settle_bet` resolves a pending bet exactly once, crediting winnings.
//! Transport (HTTP, auth) lives outside this crate; callers pass a verified
//! account identity in.

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;

pub use config::Config;
pub use error::LedgerError;
pub use ledger::audit::{reconcile_account, reconcile_all, AccountReconciliation};
pub use ledger::db::LedgerDb;
pub use ledger::engine::LedgerEngine;
