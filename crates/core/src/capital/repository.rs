//! Contract persistence seam and its in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pillar_shared::types::{ContractId, TransactionId};
use tokio::sync::RwLock;

use super::types::{CapitalTransferContract, ContractState};
use crate::repository::RepositoryError;

/// Access to capital transfer contracts.
#[async_trait]
pub trait ContractRepository: Send + Sync {
    /// Loads a contract.
    async fn find(&self, id: ContractId)
    -> Result<Option<CapitalTransferContract>, RepositoryError>;

    /// Contracts waiting for execution, oldest first.
    async fn approved(&self) -> Result<Vec<CapitalTransferContract>, RepositoryError>;

    /// Links the contract to its ledger transactions and marks it EXECUTED.
    ///
    /// Only an APPROVED contract can be completed; completing it twice
    /// reports `NotFound`.
    async fn complete(
        &self,
        id: ContractId,
        transaction_ids: &[TransactionId],
        executed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Contract repository kept in memory.
#[derive(Default)]
pub struct InMemoryContractRepository {
    contracts: RwLock<HashMap<ContractId, CapitalTransferContract>>,
    links: RwLock<Vec<(ContractId, TransactionId)>>,
}

impl InMemoryContractRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces a contract.
    pub async fn insert(&self, contract: CapitalTransferContract) {
        self.contracts.write().await.insert(contract.id, contract);
    }

    /// Transactions linked to a contract.
    pub async fn links(&self, id: ContractId) -> Vec<TransactionId> {
        self.links
            .read()
            .await
            .iter()
            .filter(|(contract_id, _)| *contract_id == id)
            .map(|(_, transaction_id)| *transaction_id)
            .collect()
    }
}

#[async_trait]
impl ContractRepository for InMemoryContractRepository {
    async fn find(
        &self,
        id: ContractId,
    ) -> Result<Option<CapitalTransferContract>, RepositoryError> {
        Ok(self.contracts.read().await.get(&id).cloned())
    }

    async fn approved(&self) -> Result<Vec<CapitalTransferContract>, RepositoryError> {
        let mut approved: Vec<_> = self
            .contracts
            .read()
            .await
            .values()
            .filter(|c| c.state == ContractState::Approved)
            .cloned()
            .collect();
        approved.sort_by_key(|c| (c.updated_at, c.id));
        Ok(approved)
    }

    async fn complete(
        &self,
        id: ContractId,
        transaction_ids: &[TransactionId],
        executed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut contracts = self.contracts.write().await;
        let contract = contracts
            .get_mut(&id)
            .filter(|c| c.state == ContractState::Approved)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Approved contract",
                id: id.to_string(),
            })?;
        contract.state = ContractState::Executed;
        contract.updated_at = executed_at;

        let mut links = self.links.write().await;
        links.extend(transaction_ids.iter().map(|tx| (id, *tx)));
        Ok(())
    }
}
