//! Ledger Reconciliation Tool
//!
//! CLI tool to verify that every account balance on a ticket ledger matches
//! the balance re-derived from its bet and adjustment history, and to surface
//! any account that drifted.
//!
//! Usage:
//!   cargo run --bin ledger_audit -- --db-path ./karuta_ledger.db
//!   cargo run --bin ledger_audit -- --db-path ./karuta_ledger.db --username Luca

use anyhow::{bail, Context, Result};
use clap::Parser;
use karuta_backend::{reconcile_account, reconcile_all, LedgerDb};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reconciliation audit for the ticket ledger
#[derive(Parser, Debug)]
#[command(name = "ledger_audit")]
#[command(about = "Verify account balances against their bet and adjustment history")]
struct Cli {
    /// Path to the SQLite ledger database
    #[arg(short, long, env = "LEDGER_DB_PATH", default_value = "./karuta_ledger.db")]
    db_path: String,

    /// Only audit the account with this username
    #[arg(short, long)]
    username: Option<String>,
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
    let db = LedgerDb::open(&cli.db_path)
        .with_context(|| format!("Failed to open ledger at {}", cli.db_path))?;

    let reports = match &cli.username {
        Some(username) => {
            let account = db
                .get_account_by_username(username)
                .await?
                .with_context(|| format!("No account with username {}", username))?;
            vec![reconcile_account(&db, account.id).await?]
        }
        None => reconcile_all(&db).await?,
    };

    if reports.is_empty() {
        println!("No accounts on ledger.");
        return Ok(());
    }

    println!(
        "{:<16} {:>8} {:>9} {:>9} {:>9} {:>9} {:>9}  STATUS",
        "USERNAME", "START", "WAGERED", "CREDITED", "ADJUSTED", "EXPECTED", "ACTUAL"
    );
    let mut unbalanced = 0usize;
    for report in &reports {
        let status = if report.balanced() {
            "ok".to_string()
        } else {
            unbalanced += 1;
            format!("DRIFT {:+}", report.difference())
        };
        println!(
            "{:<16} {:>8} {:>9} {:>9} {:>9} {:>9} {:>9}  {}",
            report.username,
            report.starting_balance,
            report.total_wagered,
            report.total_credited,
            report.total_adjusted,
            report.expected_balance,
            report.actual_balance,
            status
        );
    }

    println!();
    println!(
        "{} account(s) audited, {} unbalanced",
        reports.len(),
        unbalanced
    );

    if unbalanced > 0 {
        bail!("{} account(s) failed reconciliation", unbalanced);
    }

    Ok(())
}
