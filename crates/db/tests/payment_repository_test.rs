//! Integration tests for the payment repository and return queue.

mod common;

use chrono::{NaiveDate, Utc};
use pillar_core::RepositoryError;
use pillar_core::ledger::BankAccountType;
use pillar_core::payment::{Payment, PaymentRepository, PaymentReturn, PaymentStatus};
use pillar_db::SeaPaymentRepository;
use pillar_shared::types::{PaymentId, PaymentReturnId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{fresh_reference, setup};

fn payment(iban: &str, amount: Decimal, status: PaymentStatus) -> Payment {
    Payment {
        id: PaymentId::new(),
        user_id: None,
        amount,
        beneficiary_iban: iban.to_string(),
        end_to_end_id: Some(format!("E2E-{}", &Uuid::new_v4().simple().to_string()[..24])),
        status,
        created_at: Utc::now(),
    }
}

fn queued_return(amount: Decimal) -> PaymentReturn {
    PaymentReturn {
        id: PaymentReturnId::new(),
        external_reference: fresh_reference(),
        bank_account: BankAccountType::DepositEur,
        end_to_end_id: None,
        beneficiary_iban: None,
        amount,
        remittance_information: "Returned AC04".to_string(),
        booked_on: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        matched_payment_id: None,
    }
}

fn unique_iban() -> String {
    format!("EE{}", &Uuid::new_v4().simple().to_string()[..18])
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_return_queue_is_idempotent() {
    let Some(db) = setup().await else { return };
    let repo = SeaPaymentRepository::new(db);

    let item = queued_return(dec!(40.00));
    assert!(repo.record_return(item.clone()).await.unwrap());

    let again = PaymentReturn {
        id: PaymentReturnId::new(),
        ..item.clone()
    };
    assert!(!repo.record_return(again).await.unwrap());

    let queued = repo.unmatched_returns().await.unwrap();
    assert_eq!(
        queued
            .iter()
            .filter(|r| r.external_reference == item.external_reference)
            .count(),
        1
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_matched_return_leaves_the_queue() {
    let Some(db) = setup().await else { return };
    let repo = SeaPaymentRepository::new(db);

    let target = payment(&unique_iban(), dec!(15.00), PaymentStatus::Verified);
    repo.insert_payment(&target).await.unwrap();
    let item = queued_return(dec!(15.00));
    repo.record_return(item.clone()).await.unwrap();

    repo.mark_return_matched(item.id, target.id).await.unwrap();
    repo.update_status(target.id, PaymentStatus::Returned)
        .await
        .unwrap();

    assert!(
        !repo
            .unmatched_returns()
            .await
            .unwrap()
            .iter()
            .any(|r| r.id == item.id)
    );
    let stored = repo.find_payment(target.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Returned);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_lookup_by_end_to_end_id() {
    let Some(db) = setup().await else { return };
    let repo = SeaPaymentRepository::new(db);

    let target = payment(&unique_iban(), dec!(8.00), PaymentStatus::Received);
    repo.insert_payment(&target).await.unwrap();

    let e2e = target.end_to_end_id.clone().unwrap();
    let found = repo.find_by_end_to_end_id(&e2e).await.unwrap().unwrap();
    assert_eq!(found.id, target.id);
    assert!(repo.find_by_end_to_end_id("E2E-missing").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_fallback_lookup_only_sees_returnable_payments() {
    let Some(db) = setup().await else { return };
    let repo = SeaPaymentRepository::new(db);

    let iban = unique_iban();
    let open = payment(&iban, dec!(20.00), PaymentStatus::ToBeReturned);
    let settled = payment(&iban, dec!(20.00), PaymentStatus::Processed);
    let other_amount = payment(&iban, dec!(21.00), PaymentStatus::Verified);
    for p in [&open, &settled, &other_amount] {
        repo.insert_payment(p).await.unwrap();
    }

    let found = repo
        .find_returnable_by_iban_and_amount(&iban, dec!(20.00))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, open.id);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_updating_missing_payment_is_not_found() {
    let Some(db) = setup().await else { return };
    let repo = SeaPaymentRepository::new(db);

    let err = repo
        .update_status(PaymentId::new(), PaymentStatus::Returned)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}
