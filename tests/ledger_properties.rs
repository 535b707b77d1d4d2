//! Integration tests for the ticket ledger
//!
//! Exercises the public API end to end, including the concurrency properties
//! the engine guarantees: no overdraft under racing placements, exactly-once
//! credit under racing settlements, and conservation of tickets across mixed
//! activity.

use karuta_backend::models::{BetStatus, SettleOutcome, WagerSpec};
use karuta_backend::{reconcile_all, LedgerDb, LedgerEngine, LedgerError};
use serde_json::json;
use tempfile::NamedTempFile;

fn create_engine() -> (LedgerEngine, LedgerDb, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = LedgerDb::open(temp_file.path().to_str().unwrap()).unwrap();
    (LedgerEngine::new(db.clone()), db, temp_file)
}

fn wager(amount: i64) -> WagerSpec {
    WagerSpec {
        match_id: Some("jets_vs_sharks_1700000000".to_string()),
        match_payload: json!({
            "home_team": "Sharks",
            "away_team": "Jets",
            "commence_time": "2025-06-01T18:00:00Z",
        }),
        outcome_code: "1".to_string(),
        outcome_label: "Jets win".to_string(),
        amount,
        odds: 2.0,
        potential_winnings: amount * 2,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_full_balance_placements_allow_exactly_one_winner() {
    let (engine, db, _temp) = create_engine();
    let account = db.create_account("luca", "hash", 100).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let account_id = account.id;
        handles.push(tokio::spawn(async move {
            engine.place_bet(account_id, wager(100)).await
        }));
    }

    let mut successes = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(placed) => {
                successes += 1;
                assert_eq!(placed.balance, 0);
            }
            Err(LedgerError::InsufficientBalance { available: 0, .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(insufficient, 7);
    assert_eq!(db.get_account(account.id).await.unwrap().balance, 0);
    assert_eq!(db.list_bets_for_account(account.id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_settlements_credit_exactly_once() {
    let (engine, db, _temp) = create_engine();
    let account = db.create_account("luca", "hash", 100).await.unwrap();
    let placed = engine.place_bet(account.id, wager(30)).await.unwrap();
    assert_eq!(placed.balance, 70);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let bet_id = placed.bet.id;
        handles.push(tokio::spawn(async move {
            engine.settle_bet(bet_id, SettleOutcome::Won).await
        }));
    }

    let mut successes = 0;
    let mut already_settled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(bet) => {
                successes += 1;
                assert_eq!(bet.status, BetStatus::Won);
            }
            Err(LedgerError::BetAlreadySettled {
                status: BetStatus::Won,
            }) => already_settled += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(already_settled, 7);
    // 100 - 30 + 60, credited once regardless of how many settles raced
    assert_eq!(db.get_account(account.id).await.unwrap().balance, 130);
}

#[tokio::test]
async fn settlement_round_trip_matches_expected_balances() {
    let (engine, db, _temp) = create_engine();
    let account = db.create_account("luca", "hash", 100).await.unwrap();

    let placed = engine
        .place_bet(
            account.id,
            WagerSpec {
                amount: 30,
                odds: 2.0,
                potential_winnings: 60,
                ..wager(30)
            },
        )
        .await
        .unwrap();
    assert_eq!(placed.balance, 70);
    assert_eq!(placed.bet.status, BetStatus::Pending);

    let settled = engine
        .settle_bet(placed.bet.id, SettleOutcome::Won)
        .await
        .unwrap();
    assert_eq!(settled.status, BetStatus::Won);
    assert_eq!(db.get_account(account.id).await.unwrap().balance, 130);

    let second = engine.settle_bet(placed.bet.id, SettleOutcome::Lost).await;
    assert!(matches!(
        second,
        Err(LedgerError::BetAlreadySettled {
            status: BetStatus::Won
        })
    ));
    assert_eq!(db.get_account(account.id).await.unwrap().balance, 130);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn mixed_concurrent_activity_conserves_tickets() {
    let (engine, db, _temp) = create_engine();

    let mut account_ids = Vec::new();
    for (name, start) in [("evvortex", 278), ("razgab", 226), ("luca", 255), ("roby56", 176)] {
        let account = db.create_account(name, "hash", start).await.unwrap();
        account_ids.push(account.id);
    }

    // Each account places several bets concurrently; every other bet is then
    // settled, alternating won/lost, while new placements are still landing.
    let mut handles = Vec::new();
    for &account_id in &account_ids {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut bet_ids = Vec::new();
            for i in 0..6i64 {
                let placed = engine.place_bet(account_id, wager(5 + i)).await.unwrap();
                bet_ids.push(placed.bet.id);
            }
            for (i, bet_id) in bet_ids.into_iter().enumerate() {
                if i % 2 == 0 {
                    let outcome = if i % 4 == 0 {
                        SettleOutcome::Won
                    } else {
                        SettleOutcome::Lost
                    };
                    engine.settle_bet(bet_id, outcome).await.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let reports = reconcile_all(&db).await.unwrap();
    assert_eq!(reports.len(), 4);
    for report in reports {
        assert!(
            report.balanced(),
            "{} drifted by {}",
            report.username,
            report.difference()
        );
        assert!(report.actual_balance >= 0);
    }
}

#[tokio::test]
async fn placement_failures_leave_no_trace() {
    let (engine, db, _temp) = create_engine();
    let account = db.create_account("luca", "hash", 40).await.unwrap();

    // Overdraft
    let result = engine.place_bet(account.id, wager(41)).await;
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientBalance {
            available: 40,
            requested: 41
        })
    ));

    // Forged payout
    let result = engine
        .place_bet(
            account.id,
            WagerSpec {
                amount: 10,
                odds: 2.0,
                potential_winnings: 10000,
                ..wager(10)
            },
        )
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidWager { .. })));

    assert_eq!(db.get_account(account.id).await.unwrap().balance, 40);
    assert!(db.list_bets_for_account(account.id).await.unwrap().is_empty());
    assert!(db.list_all_bets().await.unwrap().is_empty());
}
