//! Runtime Configuration
//! Mission: Resolve ledger settings from the environment with sane defaults

use anyhow::Result;
use std::collections::HashMap;

/// Starting tickets granted when no per-username override applies.
const DEFAULT_STARTING_TICKETS: i64 = 50;

/// Per-username starting-ticket grants carried over from the original deploy.
const DEFAULT_TICKET_OVERRIDES: &str = "EVVORTEX=278,Razgab=226,Luca=255,Roby56=176";

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite ledger database.
    pub database_path: String,
    /// Tickets granted to a freshly created account.
    pub default_starting_tickets: i64,
    /// Per-username overrides for the starting grant.
    pub starting_ticket_overrides: HashMap<String, i64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("LEDGER_DB_PATH").unwrap_or_else(|_| "./karuta_ledger.db".to_string());

        let default_starting_tickets = std::env::var("STARTING_TICKETS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v >= 0)
            .unwrap_or(DEFAULT_STARTING_TICKETS);

        let starting_ticket_overrides = std::env::var("STARTING_TICKET_OVERRIDES")
            .unwrap_or_else(|_| DEFAULT_TICKET_OVERRIDES.to_string())
            .split(',')
            .filter_map(|pair| {
                let (name, count) = pair.split_once('=')?;
                let count = count.trim().parse::<i64>().ok().filter(|&v| v >= 0)?;
                Some((name.trim().to_string(), count))
            })
            .collect();

        Ok(Self {
            database_path,
            default_starting_tickets,
            starting_ticket_overrides,
        })
    }

    /// Starting balance for a new account with the given username.
    pub fn starting_tickets_for(&self, username: &str) -> i64 {
        self.starting_ticket_overrides
            .get(username)
            .copied()
            .unwrap_or(self.default_starting_tickets)
    }
}
