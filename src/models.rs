//! Ledger Data Model
//! Mission: Define the account, bet, and adjustment records the ledger persists

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A registered user and its ticket balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    /// Opaque secret-verification material owned by the auth layer.
    /// Stored verbatim, never interpreted here - never serialize.
    #[serde(skip_serializing)]
    pub credential_hash: String,
    /// Tickets currently available to wager. Never negative once committed.
    pub balance: i64,
    /// Balance granted at registration; reconciliation re-derives the current
    /// balance from this plus the bet and adjustment history.
    pub starting_balance: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Bet lifecycle: `pending` until settled, then terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
}

impl BetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BetStatus::Pending),
            "won" => Some(BetStatus::Won),
            "lost" => Some(BetStatus::Lost),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution applied by `settle_bet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleOutcome {
    Won,
    Lost,
}

impl SettleOutcome {
    pub fn status(&self) -> BetStatus {
        match self {
            SettleOutcome::Won => BetStatus::Won,
            SettleOutcome::Lost => BetStatus::Lost,
        }
    }
}

/// An immutable wager record with a mutable status field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Human-readable event key, derived from the payload when the caller
    /// does not supply one.
    pub match_id: String,
    /// Externally-supplied match data, stored verbatim.
    pub match_payload: Value,
    pub outcome_code: String,
    pub outcome_label: String,
    /// Tickets reserved at placement time.
    pub amount: i64,
    pub odds: f64,
    /// Credited if the bet resolves as won; locked at placement.
    pub potential_winnings: i64,
    pub status: BetStatus,
    pub created_at: String,
    pub settled_at: Option<String>,
}

/// Caller-supplied terms for a new wager.
#[derive(Debug, Clone, Deserialize)]
pub struct WagerSpec {
    pub match_id: Option<String>,
    pub match_payload: Value,
    pub outcome_code: String,
    pub outcome_label: String,
    pub amount: i64,
    pub odds: f64,
    pub potential_winnings: i64,
}

/// Result of a successful placement: the bet plus the post-debit balance.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedBet {
    pub bet: Bet,
    pub balance: i64,
}

/// A signed balance change applied outside bet placement/settlement.
/// Keeps admin corrections visible to reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub delta: i64,
    pub reason: String,
    pub created_at: String,
}

/// Per-account balance overview for the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSummary {
    pub username: String,
    pub balance: i64,
    pub updated_at: String,
}
