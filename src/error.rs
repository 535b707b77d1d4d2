//! Ledger Error Taxonomy
//! Mission: Report every ledger failure as a distinct, typed condition

use crate::models::BetStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors reported by ledger operations.
///
/// Every variant maps to a stable caller-facing condition. Only
/// [`LedgerError::Unavailable`] is safe to retry: the store guarantees that a
/// failed transaction committed nothing. All other variants are terminal for
/// that call.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("bet not found: {0}")]
    BetNotFound(Uuid),

    #[error("invalid wager: {reason}")]
    InvalidWager { reason: String },

    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("bet already settled as {status}")]
    BetAlreadySettled { status: BetStatus },

    #[error("username already registered: {0}")]
    UsernameTaken(String),

    #[error("ledger store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
}

impl LedgerError {
    pub fn invalid_wager(reason: impl Into<String>) -> Self {
        LedgerError::InvalidWager {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the operation verbatim.
    pub fn is_retriable(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}
