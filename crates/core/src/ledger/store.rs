//! The ledger store seam.
//!
//! Implementations must make `post` and `post_batch` atomic and must
//! enforce uniqueness of `(external_reference, transaction_type)` at the
//! storage layer so concurrent writers cannot both succeed.

use async_trait::async_trait;
use pillar_shared::types::TransactionId;
use rust_decimal::Decimal;

use super::account::LedgerAccount;
use super::error::LedgerResult;
use super::reference::ExternalReference;
use super::types::{AccountPosting, NewTransaction, PostedTransaction, TransactionType};

/// Append-only, idempotent double-entry store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Validates and commits one transaction, creating referenced accounts.
    ///
    /// # Errors
    ///
    /// `Duplicate` when the idempotency key exists, `Unbalanced` or
    /// `EmptyTransaction` on invalid postings, `Storage` otherwise.
    async fn post(&self, transaction: NewTransaction) -> LedgerResult<PostedTransaction>;

    /// Commits several transactions in one unit of work. Either every
    /// transaction is committed or none is.
    ///
    /// # Errors
    ///
    /// The first error any transaction would raise on its own, including a
    /// duplicate key repeated inside the batch.
    async fn post_batch(
        &self,
        transactions: Vec<NewTransaction>,
    ) -> LedgerResult<Vec<PostedTransaction>>;

    /// Looks up a committed transaction by its idempotency key.
    async fn find_entry(
        &self,
        external_reference: ExternalReference,
        transaction_type: TransactionType,
    ) -> LedgerResult<Option<TransactionId>>;

    /// Loads a committed transaction with its postings.
    async fn transaction(&self, id: TransactionId) -> LedgerResult<Option<PostedTransaction>>;

    /// Sum of all postings to the account; zero for unknown accounts.
    async fn balance(&self, account: &LedgerAccount) -> LedgerResult<Decimal>;

    /// Postings to one account in commit order.
    async fn postings(&self, account: &LedgerAccount) -> LedgerResult<Vec<AccountPosting>>;

    /// Returns true when a transaction with this key exists.
    async fn has_entry(
        &self,
        external_reference: ExternalReference,
        transaction_type: TransactionType,
    ) -> LedgerResult<bool> {
        Ok(self
            .find_entry(external_reference, transaction_type)
            .await?
            .is_some())
    }

    /// Posts a transaction, treating an existing idempotency key as success.
    ///
    /// Returns `None` when the transaction was already present.
    async fn post_once(
        &self,
        transaction: NewTransaction,
    ) -> LedgerResult<Option<PostedTransaction>> {
        match self.post(transaction).await {
            Ok(posted) => Ok(Some(posted)),
            Err(err) if err.is_duplicate() => Ok(None),
            Err(err) => Err(err),
        }
    }
}
