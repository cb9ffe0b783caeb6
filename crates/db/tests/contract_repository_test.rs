//! Integration tests for capital transfer contracts, including execution
//! against the PostgreSQL ledger.

mod common;

use std::sync::Arc;

use chrono::Utc;
use pillar_core::RepositoryError;
use pillar_core::capital::{
    CapitalTransferAmount, CapitalTransferContract, CapitalTransferExecutor, CapitalType,
    ContractRepository, ContractState, LoggingNotifier,
};
use pillar_core::events::BroadcastPublisher;
use pillar_core::ledger::{
    AccountPurpose, AssetType, LedgerAccount, LedgerStore, NewTransaction, TransactionType,
};
use pillar_db::{SeaContractRepository, SeaLedgerStore};
use pillar_shared::types::{ContractId, TransactionId, UserId};
use rust_decimal_macros::dec;

use common::{clock, fresh_reference, setup};

fn contract(seller: UserId, buyer: UserId) -> CapitalTransferContract {
    CapitalTransferContract {
        id: ContractId::new(),
        seller,
        buyer,
        transfer_amounts: vec![CapitalTransferAmount {
            capital_type: CapitalType::CapitalPayment,
            book_value: dec!(100.00),
            unit_price: dec!(2.00),
        }],
        state: ContractState::Approved,
        updated_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_insert_find_and_complete() {
    let Some(db) = setup().await else { return };
    let repo = SeaContractRepository::new(db);

    let contract = contract(UserId::new(), UserId::new());
    repo.insert(&contract).await.expect("insert failed");

    let loaded = repo.find(contract.id).await.unwrap().unwrap();
    assert_eq!(loaded.transfer_amounts, contract.transfer_amounts);
    assert!(repo.approved().await.unwrap().iter().any(|c| c.id == contract.id));

    repo.complete(contract.id, &[], Utc::now()).await.unwrap();
    let executed = repo.find(contract.id).await.unwrap().unwrap();
    assert_eq!(executed.state, ContractState::Executed);
    assert!(!repo.approved().await.unwrap().iter().any(|c| c.id == contract.id));

    let err = repo.complete(contract.id, &[], Utc::now()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_failed_link_keeps_contract_approved() {
    let Some(db) = setup().await else { return };
    let repo = SeaContractRepository::new(db);

    let contract = contract(UserId::new(), UserId::new());
    repo.insert(&contract).await.unwrap();

    // No such ledger transaction: the foreign key rejects the link.
    let err = repo
        .complete(contract.id, &[TransactionId::new()], Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Storage(_)));

    let loaded = repo.find(contract.id).await.unwrap().unwrap();
    assert_eq!(loaded.state, ContractState::Approved);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_executes_transfer_against_database_ledger() {
    let Some(db) = setup().await else { return };
    let ledger = Arc::new(SeaLedgerStore::new(db.clone(), clock()));
    let contracts = Arc::new(SeaContractRepository::new(db));

    let seller = UserId::new();
    let buyer = UserId::new();
    let capital = |user, asset| {
        LedgerAccount::user(
            user,
            AccountPurpose::Capital(CapitalType::CapitalPayment),
            asset,
        )
    };
    let seller_capital = capital(seller, AssetType::FundUnit);
    // 80 units bought for 160.00.
    ledger
        .post(
            NewTransaction::new(TransactionType::CapitalAcquired, fresh_reference())
                .posting(
                    LedgerAccount::system(AccountPurpose::FundUnits, AssetType::FundUnit),
                    dec!(80),
                )
                .posting(seller_capital, dec!(-80))
                .posting(
                    LedgerAccount::system(AccountPurpose::UnattributedReturns, AssetType::Currency),
                    dec!(160.00),
                )
                .posting(capital(seller, AssetType::Currency), dec!(-160.00)),
        )
        .await
        .expect("funding failed");

    let contract = contract(seller, buyer);
    contracts.insert(&contract).await.unwrap();

    let executor = CapitalTransferExecutor::new(
        ledger.clone(),
        contracts.clone(),
        Arc::new(LoggingNotifier),
        Arc::new(BroadcastPublisher::default()),
        clock(),
        dec!(0.01),
    );
    let outcome = executor.execute(contract.id).await.expect("execution failed");

    assert_eq!(outcome.transaction_ids.len(), 2);
    assert_eq!(ledger.balance(&seller_capital).await.unwrap(), dec!(-30));
    assert_eq!(
        ledger.balance(&capital(seller, AssetType::Currency)).await.unwrap(),
        dec!(-60.00)
    );
    assert_eq!(
        ledger.balance(&capital(buyer, AssetType::FundUnit)).await.unwrap(),
        dec!(-50)
    );
    assert_eq!(
        ledger.balance(&capital(buyer, AssetType::Currency)).await.unwrap(),
        dec!(-100.00)
    );

    let mut links = contracts.links(contract.id).await.unwrap();
    let mut expected = outcome.transaction_ids.clone();
    links.sort();
    expected.sort();
    assert_eq!(links, expected);
}
