//! Capital transfer sweep job.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::JobError;
use super::runner::ScheduledJob;
use crate::capital::CapitalTransferExecutor;

/// Executes every approved capital transfer contract.
pub struct CapitalTransferJob {
    executor: Arc<CapitalTransferExecutor>,
}

impl CapitalTransferJob {
    /// Lock name of the job.
    pub const NAME: &'static str = "capital-transfer-execution";

    /// Creates the job.
    #[must_use]
    pub fn new(executor: Arc<CapitalTransferExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ScheduledJob for CapitalTransferJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self) -> Result<(), JobError> {
        self.executor.sweep().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capital::{
        CapitalTransferAmount, CapitalTransferContract, CapitalType, ContractRepository,
        ContractState, InMemoryContractRepository, LoggingNotifier,
    };
    use crate::events::BroadcastPublisher;
    use crate::jobs::lock::{InMemoryJobLock, LockLease};
    use crate::jobs::runner::{RunOutcome, run_locked};
    use crate::ledger::InMemoryLedgerStore;
    use chrono::{Duration, Utc};
    use pillar_shared::FixedClock;
    use pillar_shared::types::{ContractId, UserId};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_sweep_runs_under_lock() {
        let clock = Arc::new(FixedClock::default());
        let ledger = Arc::new(InMemoryLedgerStore::new(clock.clone()));
        let contracts = Arc::new(InMemoryContractRepository::new());
        let executor = CapitalTransferExecutor::new(
            ledger,
            contracts.clone(),
            Arc::new(LoggingNotifier),
            Arc::new(BroadcastPublisher::default()),
            clock.clone(),
            dec!(0.02),
        );
        let job = CapitalTransferJob::new(Arc::new(executor));
        let lock = InMemoryJobLock::new("node-a", clock);
        let lease = LockLease::new(Duration::minutes(30), Duration::minutes(1));

        // Seller holds nothing, so the contract fails and stays approved.
        let contract = CapitalTransferContract {
            id: ContractId::new(),
            seller: UserId::new(),
            buyer: UserId::new(),
            transfer_amounts: vec![CapitalTransferAmount {
                capital_type: CapitalType::Profit,
                book_value: dec!(10.00),
                unit_price: dec!(1),
            }],
            state: ContractState::Approved,
            updated_at: Utc::now(),
        };
        contracts.insert(contract.clone()).await;

        assert_eq!(
            run_locked(&lock, &job, lease).await.unwrap(),
            RunOutcome::Completed
        );
        assert_eq!(
            run_locked(&lock, &job, lease).await.unwrap(),
            RunOutcome::Skipped
        );
        assert_eq!(
            contracts.find(contract.id).await.unwrap().unwrap().state,
            ContractState::Approved
        );
    }
}
