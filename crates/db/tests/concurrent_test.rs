//! Concurrent posting tests.
//!
//! These tests verify that:
//! - Racing posts of the same bank event commit exactly once
//! - Concurrent distinct posts against one account produce the exact sum

mod common;

use std::sync::Arc;

use futures::future::join_all;
use pillar_core::ledger::{
    AccountPurpose, AssetType, BankAccountType, LedgerAccount, LedgerError, LedgerStore,
    NewTransaction, TransactionType,
};
use pillar_db::SeaLedgerStore;
use pillar_shared::types::UserId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use common::{clock, deposit, fresh_reference, setup};

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_racing_duplicates_commit_once() {
    let Some(db) = setup().await else { return };
    let store = Arc::new(SeaLedgerStore::new(db, clock()));
    let (transaction, member) = deposit(dec!(12.00));

    let workers = 16;
    let barrier = Arc::new(Barrier::new(workers));
    let tasks = (0..workers).map(|_| {
        let store = store.clone();
        let barrier = barrier.clone();
        let transaction = transaction.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            store.post(transaction).await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let committed = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::Duplicate { .. })))
        .count();
    assert_eq!(committed, 1);
    assert_eq!(duplicates, workers - 1);
    assert_eq!(store.balance(&member).await.unwrap(), dec!(-12.00));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_distinct_posts_sum_exactly() {
    let Some(db) = setup().await else { return };
    let store = Arc::new(SeaLedgerStore::new(db, clock()));
    let member = LedgerAccount::user(UserId::new(), AccountPurpose::UserCash, AssetType::Currency);

    let posts = 100_i64;
    let tasks = (1..=posts).map(|cents| {
        let store = store.clone();
        tokio::spawn(async move {
            let amount = Decimal::new(cents, 2);
            store
                .post(
                    NewTransaction::new(TransactionType::BankAdjustment, fresh_reference())
                        .posting(LedgerAccount::clearing(BankAccountType::DepositEur), amount)
                        .posting(member, -amount),
                )
                .await
        })
    });

    for joined in join_all(tasks).await {
        joined.expect("task panicked").expect("post failed");
    }

    // 0.01 + 0.02 + ... + 1.00
    let expected = Decimal::new(posts * (posts + 1) / 2, 2);
    assert_eq!(store.balance(&member).await.unwrap(), -expected);
    assert_eq!(store.postings(&member).await.unwrap().len(), usize::try_from(posts).unwrap());
}
