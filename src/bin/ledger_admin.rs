//! Ledger Admin Tool
//!
//! CLI counterpart of the admin surface: register accounts, inspect balances
//! and bets, settle pending bets, and apply balance corrections. Every
//! mutation goes through the ledger engine, so the audit trail stays intact.
//!
//! Usage:
//!   cargo run --bin ledger_admin -- register Luca '$2b$10$...'
//!   cargo run --bin ledger_admin -- balances
//!   cargo run --bin ledger_admin -- bets --username Luca
//!   cargo run --bin ledger_admin -- settle 7c9e6679-7425-40de-944b-e07fc1f90ae7 won
//!   cargo run --bin ledger_admin -- set-tickets Luca 300 --reason "season reset"

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use karuta_backend::models::SettleOutcome;
use karuta_backend::{Config, LedgerDb, LedgerEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Admin operations for the ticket ledger
#[derive(Parser, Debug)]
#[command(name = "ledger_admin")]
#[command(about = "Register accounts, settle bets, and correct balances")]
struct Cli {
    /// Path to the SQLite ledger database (defaults to the configured one)
    #[arg(short, long)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new account with its starting ticket grant
    Register {
        username: String,
        /// Opaque credential hash produced by the auth layer
        credential_hash: String,
        /// Override the configured starting grant
        #[arg(short, long)]
        tickets: Option<i64>,
    },

    /// List every account's balance
    Balances,

    /// List bets, newest first
    Bets {
        /// Only bets for this username
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Settle a pending bet
    Settle {
        bet_id: Uuid,
        #[arg(value_parser = parse_outcome)]
        outcome: SettleOutcome,
    },

    /// Set an account's ticket count outright
    SetTickets {
        username: String,
        tickets: i64,
        #[arg(short, long, default_value = "admin correction")]
        reason: String,
    },
}

fn parse_outcome(raw: &str) -> std::result::Result<SettleOutcome, String> {
    match raw {
        "won" => Ok(SettleOutcome::Won),
        "lost" => Ok(SettleOutcome::Lost),
        other => Err(format!("expected 'won' or 'lost', got '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let db_path = cli.db_path.unwrap_or_else(|| config.database_path.clone());
    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("Failed to open ledger at {}", db_path))?;
    let engine = LedgerEngine::new(db.clone());

    match cli.command {
        Commands::Register {
            username,
            credential_hash,
            tickets,
        } => {
            let starting = tickets.unwrap_or_else(|| config.starting_tickets_for(&username));
            let account = db
                .create_account(&username, &credential_hash, starting)
                .await?;
            println!(
                "Registered {} with {} tickets (id {})",
                account.username, account.balance, account.id
            );
        }

        Commands::Balances => {
            let summaries = db.list_balances().await?;
            println!("{:<16} {:>8}  UPDATED", "USERNAME", "TICKETS");
            for summary in summaries {
                println!(
                    "{:<16} {:>8}  {}",
                    summary.username, summary.balance, summary.updated_at
                );
            }
        }

        Commands::Bets { username } => {
            let bets = match username {
                Some(name) => {
                    let account = db
                        .get_account_by_username(&name)
                        .await?
                        .with_context(|| format!("No account with username {}", name))?;
                    db.list_bets_for_account(account.id).await?
                }
                None => db.list_all_bets().await?,
            };
            println!(
                "{:<36} {:<28} {:>7} {:>6} {:>8}  STATUS",
                "BET", "MATCH", "AMOUNT", "ODDS", "PAYOUT"
            );
            for bet in bets {
                println!(
                    "{:<36} {:<28} {:>7} {:>6.2} {:>8}  {}",
                    bet.id, bet.match_id, bet.amount, bet.odds, bet.potential_winnings, bet.status
                );
            }
        }

        Commands::Settle { bet_id, outcome } => {
            let bet = engine.settle_bet(bet_id, outcome).await?;
            println!("Bet {} marked as {}", bet.id, bet.status);
        }

        Commands::SetTickets {
            username,
            tickets,
            reason,
        } => {
            let account = db
                .get_account_by_username(&username)
                .await?
                .with_context(|| format!("No account with username {}", username))?;
            let updated = engine.adjust_balance(account.id, tickets, &reason).await?;
            println!(
                "{} now holds {} tickets",
                updated.username, updated.balance
            );
        }
    }

    Ok(())
}
