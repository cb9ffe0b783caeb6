//! PostgreSQL ledger store.
//!
//! Accounts get a deterministic id derived from their key, so they can be
//! created lazily with `ON CONFLICT DO NOTHING` and never need a lookup
//! before posting. Every batch is one database transaction; the unique
//! index on `(external_reference, transaction_type)` turns a concurrent
//! duplicate into a rollback of the whole batch.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use pillar_core::ledger::{
    AccountOwner, AccountPosting, AccountPurpose, AssetType, ExternalReference, LedgerAccount,
    LedgerError, LedgerResult, LedgerStore, NewTransaction, OwnerType, PostedTransaction, Posting,
    TransactionType, validate_balance,
};
use pillar_shared::Clock;
use pillar_shared::types::{TransactionId, UserId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, SqlErr, TransactionTrait,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::entities::{ledger_accounts, ledger_entries, ledger_transactions};

const ACCOUNT_NAMESPACE: Uuid = Uuid::from_u128(0x5c1e_7a2b_94d0_4f3e_8a61_0b7d_c2e4_19f5);

/// Stable database id of a ledger account.
#[must_use]
pub fn account_id(account: &LedgerAccount) -> Uuid {
    Uuid::new_v5(&ACCOUNT_NAMESPACE, account.key().as_bytes())
}

fn storage(err: DbErr) -> LedgerError {
    LedgerError::Storage(err.to_string())
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Ledger store backed by PostgreSQL.
#[derive(Clone)]
pub struct SeaLedgerStore {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl SeaLedgerStore {
    /// Creates a new ledger store.
    #[must_use]
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    async fn ensure_account<C: ConnectionTrait>(
        conn: &C,
        account: &LedgerAccount,
        now: DateTime<FixedOffset>,
    ) -> Result<Uuid, DbErr> {
        let id = account_id(account);
        let model = ledger_accounts::ActiveModel {
            id: Set(id),
            account_key: Set(account.key()),
            owner_type: Set(account.owner.owner_type().as_str().to_string()),
            owner_id: Set(account.owner.user_id().map(UserId::into_inner)),
            purpose: Set(account.purpose.name().to_string()),
            qualifier: Set(account.purpose.qualifier().map(str::to_string)),
            asset_type: Set(account.asset_type.as_str().to_string()),
            created_at: Set(now),
        };
        ledger_accounts::Entity::insert(model)
            .on_conflict(
                OnConflict::column(ledger_accounts::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(id)
    }

    async fn insert_transaction<C: ConnectionTrait>(
        conn: &C,
        transaction: &NewTransaction,
        id: TransactionId,
        now: DateTime<FixedOffset>,
    ) -> LedgerResult<()> {
        let header = ledger_transactions::ActiveModel {
            id: Set(id.into_inner()),
            transaction_type: Set(transaction.transaction_type.as_str().to_string()),
            external_reference: Set(transaction.external_reference.into_inner()),
            metadata: Set(transaction.metadata.clone()),
            created_at: Set(now),
        };
        ledger_transactions::Entity::insert(header)
            .exec_without_returning(conn)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    LedgerError::Duplicate {
                        external_reference: transaction.external_reference,
                        transaction_type: transaction.transaction_type,
                    }
                } else {
                    storage(err)
                }
            })?;

        for (position, posting) in transaction.postings.iter().enumerate() {
            let account_id = Self::ensure_account(conn, &posting.account, now)
                .await
                .map_err(storage)?;
            let position = i32::try_from(position)
                .map_err(|_| LedgerError::Storage("too many postings".to_string()))?;
            let entry = ledger_entries::ActiveModel {
                id: Set(Uuid::new_v4()),
                sequence: NotSet,
                transaction_id: Set(id.into_inner()),
                account_id: Set(account_id),
                position: Set(position),
                amount: Set(posting.amount),
                asset_type: Set(posting.asset_type().as_str().to_string()),
                created_at: Set(now),
            };
            ledger_entries::Entity::insert(entry)
                .exec_without_returning(conn)
                .await
                .map_err(storage)?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SeaLedgerStore {
    async fn post(&self, transaction: NewTransaction) -> LedgerResult<PostedTransaction> {
        let mut posted = self.post_batch(vec![transaction]).await?;
        posted
            .pop()
            .ok_or_else(|| LedgerError::Storage("batch returned no transaction".to_string()))
    }

    async fn post_batch(
        &self,
        transactions: Vec<NewTransaction>,
    ) -> LedgerResult<Vec<PostedTransaction>> {
        let mut batch_keys = HashSet::new();
        for transaction in &transactions {
            validate_balance(&transaction.postings)?;
            if !batch_keys.insert((transaction.external_reference, transaction.transaction_type)) {
                return Err(LedgerError::Duplicate {
                    external_reference: transaction.external_reference,
                    transaction_type: transaction.transaction_type,
                });
            }
        }

        let created_at = self.clock.now();
        let now: DateTime<FixedOffset> = created_at.into();
        let txn = self.db.begin().await.map_err(storage)?;

        let mut posted = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let id = TransactionId::new();
            // Dropping `txn` on error rolls back the whole batch.
            Self::insert_transaction(&txn, &transaction, id, now).await?;
            debug!(
                transaction_id = %id,
                transaction_type = %transaction.transaction_type,
                external_reference = %transaction.external_reference,
                postings = transaction.postings.len(),
                "Inserted ledger transaction"
            );
            posted.push(PostedTransaction {
                id,
                transaction_type: transaction.transaction_type,
                external_reference: transaction.external_reference,
                postings: transaction.postings,
                metadata: transaction.metadata,
                created_at,
            });
        }

        txn.commit().await.map_err(|err| {
            error!(error = %err, "Ledger batch commit failed");
            storage(err)
        })?;
        Ok(posted)
    }

    async fn find_entry(
        &self,
        external_reference: ExternalReference,
        transaction_type: TransactionType,
    ) -> LedgerResult<Option<TransactionId>> {
        let id: Option<Uuid> = ledger_transactions::Entity::find()
            .filter(
                ledger_transactions::Column::ExternalReference.eq(external_reference.into_inner()),
            )
            .filter(ledger_transactions::Column::TransactionType.eq(transaction_type.as_str()))
            .select_only()
            .column(ledger_transactions::Column::Id)
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(storage)?;
        Ok(id.map(TransactionId::from_uuid))
    }

    async fn transaction(&self, id: TransactionId) -> LedgerResult<Option<PostedTransaction>> {
        let Some(header) = ledger_transactions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage)?
        else {
            return Ok(None);
        };

        let rows = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::TransactionId.eq(header.id))
            .order_by_asc(ledger_entries::Column::Position)
            .find_also_related(ledger_accounts::Entity)
            .all(&self.db)
            .await
            .map_err(storage)?;

        let mut postings = Vec::with_capacity(rows.len());
        for (entry, account) in rows {
            let account = account
                .ok_or_else(|| LedgerError::Storage(format!("entry {} has no account", entry.id)))?;
            postings.push(Posting::new(account_from_model(&account)?, entry.amount));
        }

        Ok(Some(PostedTransaction {
            id,
            transaction_type: parse_transaction_type(&header.transaction_type)?,
            external_reference: ExternalReference::from_uuid(header.external_reference),
            postings,
            metadata: header.metadata,
            created_at: header.created_at.with_timezone(&Utc),
        }))
    }

    async fn balance(&self, account: &LedgerAccount) -> LedgerResult<Decimal> {
        let sum: Option<Option<Decimal>> = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::AccountId.eq(account_id(account)))
            .select_only()
            .column_as(Expr::col(ledger_entries::Column::Amount).sum(), "balance")
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(storage)?;
        Ok(sum.flatten().unwrap_or(Decimal::ZERO))
    }

    async fn postings(&self, account: &LedgerAccount) -> LedgerResult<Vec<AccountPosting>> {
        let rows = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::AccountId.eq(account_id(account)))
            .order_by_asc(ledger_entries::Column::Sequence)
            .find_also_related(ledger_transactions::Entity)
            .all(&self.db)
            .await
            .map_err(storage)?;

        rows.into_iter()
            .map(|(entry, header)| {
                let header = header.ok_or_else(|| {
                    LedgerError::Storage(format!("entry {} has no transaction", entry.id))
                })?;
                Ok(AccountPosting {
                    transaction_id: TransactionId::from_uuid(header.id),
                    transaction_type: parse_transaction_type(&header.transaction_type)?,
                    amount: entry.amount,
                    created_at: header.created_at.with_timezone(&Utc),
                })
            })
            .collect()
    }
}

fn parse_transaction_type(value: &str) -> LedgerResult<TransactionType> {
    TransactionType::parse(value)
        .ok_or_else(|| LedgerError::Storage(format!("unknown transaction type {value}")))
}

/// Rebuilds the account identity from its stored columns.
pub(crate) fn account_from_model(model: &ledger_accounts::Model) -> LedgerResult<LedgerAccount> {
    let invalid = || LedgerError::Storage(format!("invalid ledger account {}", model.account_key));

    let owner = match (OwnerType::parse(&model.owner_type), model.owner_id) {
        (Some(OwnerType::System), None) => AccountOwner::System,
        (Some(OwnerType::User), Some(id)) => AccountOwner::User(UserId::from_uuid(id)),
        _ => return Err(invalid()),
    };
    let purpose = AccountPurpose::from_parts(&model.purpose, model.qualifier.as_deref())
        .ok_or_else(invalid)?;
    let asset_type = AssetType::parse(&model.asset_type).ok_or_else(invalid)?;

    Ok(LedgerAccount {
        owner,
        purpose,
        asset_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillar_core::capital::CapitalType;
    use pillar_core::ledger::BankAccountType;

    fn model_for(account: &LedgerAccount) -> ledger_accounts::Model {
        ledger_accounts::Model {
            id: account_id(account),
            account_key: account.key(),
            owner_type: account.owner.owner_type().as_str().to_string(),
            owner_id: account.owner.user_id().map(UserId::into_inner),
            purpose: account.purpose.name().to_string(),
            qualifier: account.purpose.qualifier().map(str::to_string),
            asset_type: account.asset_type.as_str().to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_account_id_is_stable_per_key() {
        let clearing = LedgerAccount::clearing(BankAccountType::DepositEur);
        assert_eq!(account_id(&clearing), account_id(&clearing));
        assert_ne!(
            account_id(&clearing),
            account_id(&LedgerAccount::clearing(BankAccountType::WithdrawalEur))
        );
    }

    #[test]
    fn test_account_from_model() {
        let accounts = [
            LedgerAccount::clearing(BankAccountType::FundInvestmentEur),
            LedgerAccount::user(
                UserId::new(),
                AccountPurpose::Capital(CapitalType::WorkCompensation),
                AssetType::FundUnit,
            ),
        ];
        for account in accounts {
            assert_eq!(account_from_model(&model_for(&account)).unwrap(), account);
        }
    }

    #[test]
    fn test_user_account_without_owner_is_rejected() {
        let account =
            LedgerAccount::user(UserId::new(), AccountPurpose::UserCash, AssetType::Currency);
        let mut model = model_for(&account);
        model.owner_id = None;
        assert!(matches!(
            account_from_model(&model),
            Err(LedgerError::Storage(_))
        ));
    }
}
