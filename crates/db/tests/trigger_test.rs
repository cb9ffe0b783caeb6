//! Integration tests for database triggers.
//!
//! These tests verify that PostgreSQL keeps the ledger append-only and
//! balanced at the database level, even if application logic fails.

mod common;

use chrono::Utc;
use pillar_core::ledger::{BankAccountType, LedgerAccount, LedgerStore};
use pillar_db::entities::{ledger_entries, ledger_transactions};
use pillar_db::repositories::account_id;
use pillar_db::SeaLedgerStore;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use common::{clock, deposit, setup};

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_ledger_entries_cannot_be_updated() {
    let Some(db) = setup().await else { return };
    let store = SeaLedgerStore::new(db.clone(), clock());
    let (transaction, _) = deposit(dec!(9.99));
    let posted = store.post(transaction).await.expect("post failed");

    let result = ledger_entries::Entity::update_many()
        .col_expr(ledger_entries::Column::Amount, Expr::value(dec!(0)))
        .filter(ledger_entries::Column::TransactionId.eq(posted.id.into_inner()))
        .exec(&db)
        .await;

    let err = result.expect_err("update should be rejected");
    assert!(err.to_string().contains("append-only"), "unexpected error: {err}");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_ledger_transactions_cannot_be_deleted() {
    let Some(db) = setup().await else { return };
    let store = SeaLedgerStore::new(db.clone(), clock());
    let (transaction, _) = deposit(dec!(1.00));
    let posted = store.post(transaction).await.expect("post failed");

    let result = ledger_transactions::Entity::delete_by_id(posted.id.into_inner())
        .exec(&db)
        .await;

    let err = result.expect_err("delete should be rejected");
    assert!(err.to_string().contains("append-only"), "unexpected error: {err}");
    assert!(store.transaction(posted.id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_unbalanced_rows_are_rejected_at_commit() {
    let Some(db) = setup().await else { return };
    // Create the clearing account row through a balanced post first.
    let store = SeaLedgerStore::new(db.clone(), clock());
    store.post(deposit(dec!(1)).0).await.expect("post failed");

    let clearing = LedgerAccount::clearing(BankAccountType::DepositEur);
    let transaction_id = Uuid::new_v4();
    let now = Utc::now().into();

    let txn = db.begin().await.expect("begin failed");
    ledger_transactions::Entity::insert(ledger_transactions::ActiveModel {
        id: Set(transaction_id),
        transaction_type: Set("BANK_FEE".to_string()),
        external_reference: Set(Uuid::new_v4()),
        metadata: Set(json!({})),
        created_at: Set(now),
    })
    .exec_without_returning(&txn)
    .await
    .expect("header insert failed");
    ledger_entries::Entity::insert(ledger_entries::ActiveModel {
        id: Set(Uuid::new_v4()),
        sequence: NotSet,
        transaction_id: Set(transaction_id),
        account_id: Set(account_id(&clearing)),
        position: Set(0),
        amount: Set(dec!(5.00)),
        asset_type: Set("CURRENCY".to_string()),
        created_at: Set(now),
    })
    .exec_without_returning(&txn)
    .await
    .expect("entry insert failed");

    let err = txn.commit().await.expect_err("commit should be rejected");
    assert!(err.to_string().contains("not balanced"), "unexpected error: {err}");

    let header = ledger_transactions::Entity::find_by_id(transaction_id)
        .one(&db)
        .await
        .unwrap();
    assert!(header.is_none());
}
