//! In-memory ledger store for tests and single-process runs.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use pillar_shared::Clock;
use pillar_shared::types::TransactionId;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::account::LedgerAccount;
use super::error::{LedgerError, LedgerResult};
use super::reference::ExternalReference;
use super::store::LedgerStore;
use super::types::{AccountPosting, NewTransaction, PostedTransaction, TransactionType};
use super::validation::validate_balance;

#[derive(Default)]
struct State {
    transactions: Vec<PostedTransaction>,
    keys: HashSet<(ExternalReference, TransactionType)>,
}

/// Ledger store holding every transaction in a vector behind a lock.
///
/// The write lock serialises posts, which gives the same uniqueness and
/// atomicity guarantees as the database constraint.
pub struct InMemoryLedgerStore {
    clock: Arc<dyn Clock>,
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(State::default()),
        }
    }

    /// Number of committed transactions.
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    /// Snapshot of every committed transaction.
    pub async fn all_transactions(&self) -> Vec<PostedTransaction> {
        self.state.read().await.transactions.clone()
    }

    fn check(
        state: &State,
        batch_keys: &mut HashSet<(ExternalReference, TransactionType)>,
        transaction: &NewTransaction,
    ) -> LedgerResult<()> {
        validate_balance(&transaction.postings)?;
        let key = (transaction.external_reference, transaction.transaction_type);
        if state.keys.contains(&key) || !batch_keys.insert(key) {
            return Err(LedgerError::Duplicate {
                external_reference: transaction.external_reference,
                transaction_type: transaction.transaction_type,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
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
        let mut state = self.state.write().await;

        let mut batch_keys = HashSet::new();
        for transaction in &transactions {
            Self::check(&state, &mut batch_keys, transaction)?;
        }

        let created_at = self.clock.now();
        let mut posted = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            state
                .keys
                .insert((transaction.external_reference, transaction.transaction_type));
            let committed = PostedTransaction {
                id: TransactionId::new(),
                transaction_type: transaction.transaction_type,
                external_reference: transaction.external_reference,
                postings: transaction.postings,
                metadata: transaction.metadata,
                created_at,
            };
            state.transactions.push(committed.clone());
            posted.push(committed);
        }
        Ok(posted)
    }

    async fn find_entry(
        &self,
        external_reference: ExternalReference,
        transaction_type: TransactionType,
    ) -> LedgerResult<Option<TransactionId>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| {
                t.external_reference == external_reference && t.transaction_type == transaction_type
            })
            .map(|t| t.id))
    }

    async fn transaction(&self, id: TransactionId) -> LedgerResult<Option<PostedTransaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn balance(&self, account: &LedgerAccount) -> LedgerResult<Decimal> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .flat_map(|t| t.postings.iter())
            .filter(|p| p.account == *account)
            .map(|p| p.amount)
            .sum())
    }

    async fn postings(&self, account: &LedgerAccount) -> LedgerResult<Vec<AccountPosting>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .flat_map(|t| {
                t.postings
                    .iter()
                    .filter(|p| p.account == *account)
                    .map(|p| AccountPosting {
                        transaction_id: t.id,
                        transaction_type: t.transaction_type,
                        amount: p.amount,
                        created_at: t.created_at,
                    })
            })
            .collect())
    }
}
