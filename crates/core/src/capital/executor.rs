//! Capital transfer execution.
//!
//! Member capital accounts are credit-normal: a member holding capital has
//! a negative balance on `CAPITAL/<type>`. A transfer debits the seller,
//! routes both legs through `CAPITAL_TRANSFER_CLEARING`, and credits the
//! buyer, in currency and in ownership units. All transactions of one
//! contract are committed in a single batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use pillar_shared::Clock;
use pillar_shared::types::{ContractId, TransactionId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::calculation::{clamp_units, proportional_fiat_value, requested_units};
use super::error::CapitalTransferError;
use super::notifier::{TransferNotifier, TransferRole};
use super::repository::ContractRepository;
use super::types::{CapitalTransferContract, CapitalType, ContractState};
use crate::events::{CoreEvent, EventPublisher};
use crate::ledger::{
    AccountPurpose, AssetType, ExternalReference, LedgerAccount, LedgerStore, NewTransaction,
    TransactionType,
};

/// Result of executing one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    /// Executed contract.
    pub contract_id: ContractId,
    /// Ledger transactions linked to the contract.
    pub transaction_ids: Vec<TransactionId>,
    /// True when the ledger already held the transfer and only the contract
    /// state was completed.
    pub recovered: bool,
}

/// Counts from one sweep over approved contracts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Contracts executed or recovered.
    pub executed: usize,
    /// Contracts that failed and stay approved.
    pub failed: usize,
}

/// What one contract line moves.
#[derive(Debug)]
struct LinePlan {
    capital_type: CapitalType,
    reference: ExternalReference,
    book_value: Decimal,
    unit_price: Decimal,
    units: Decimal,
    fiat_value: Decimal,
}

/// A member's holding of one capital type.
#[derive(Debug, Clone, Copy)]
struct Holding {
    fiat: Decimal,
    units: Decimal,
}

/// Executes approved capital transfer contracts against the ledger.
pub struct CapitalTransferExecutor {
    ledger: Arc<dyn LedgerStore>,
    contracts: Arc<dyn ContractRepository>,
    notifier: Arc<dyn TransferNotifier>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    tolerance: Decimal,
}

impl CapitalTransferExecutor {
    /// Creates an executor. `tolerance` is the largest drift, valued at the
    /// unit price, that is clamped to the seller's available units.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        contracts: Arc<dyn ContractRepository>,
        notifier: Arc<dyn TransferNotifier>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        tolerance: Decimal,
    ) -> Self {
        Self {
            ledger,
            contracts,
            notifier,
            events,
            clock,
            tolerance,
        }
    }

    /// Executes every approved contract. Each contract succeeds or fails on
    /// its own.
    ///
    /// # Errors
    ///
    /// Fails when the approved contracts cannot be listed or the ledger
    /// reports a balance violation.
    pub async fn sweep(&self) -> Result<SweepReport, CapitalTransferError> {
        let approved = self.contracts.approved().await?;
        let mut report = SweepReport::default();

        for contract in &approved {
            match self.execute(contract.id).await {
                Ok(_) => report.executed += 1,
                Err(err) if err.is_fatal() => {
                    error!(
                        contract_id = %contract.id,
                        error = %err,
                        "Ledger rejected capital transfer"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        contract_id = %contract.id,
                        code = err.error_code(),
                        error = %err,
                        "Failed to execute capital transfer"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            approved = approved.len(),
            executed = report.executed,
            failed = report.failed,
            "Capital transfer sweep completed"
        );
        Ok(report)
    }

    /// Executes one contract.
    ///
    /// # Errors
    ///
    /// `ContractNotFound`, `InvalidState` for a contract that is not
    /// approved, `EmptyContract` when it has no lines, `InsufficientCapital`
    /// or `ClampingToleranceExceeded` when the seller cannot cover a line,
    /// and ledger or repository failures.
    pub async fn execute(
        &self,
        contract_id: ContractId,
    ) -> Result<ExecutionOutcome, CapitalTransferError> {
        let contract = self
            .contracts
            .find(contract_id)
            .await?
            .ok_or(CapitalTransferError::ContractNotFound(contract_id))?;
        if contract.state != ContractState::Approved {
            return Err(CapitalTransferError::InvalidState {
                contract_id,
                state: contract.state,
            });
        }
        if contract.transfer_amounts.is_empty() {
            return Err(CapitalTransferError::EmptyContract(contract_id));
        }

        if let Some(transaction_ids) = self.already_posted(&contract).await? {
            info!(
                contract_id = %contract_id,
                transactions = transaction_ids.len(),
                "Capital transfer already in ledger, completing contract"
            );
            self.contracts
                .complete(contract_id, &transaction_ids, self.clock.now())
                .await?;
            return Ok(ExecutionOutcome {
                contract_id,
                transaction_ids,
                recovered: true,
            });
        }

        let plans = self.plan(&contract).await?;
        let transactions = plans
            .iter()
            .flat_map(|plan| transfer_transactions(&contract, plan))
            .collect();
        let posted = self.ledger.post_batch(transactions).await?;
        let transaction_ids: Vec<_> = posted.iter().map(|tx| tx.id).collect();

        // Not atomic with the ledger batch. A crash here leaves the contract
        // approved, and the next run completes it through `already_posted`.
        self.contracts
            .complete(contract_id, &transaction_ids, self.clock.now())
            .await?;

        for plan in &plans {
            info!(
                contract_id = %contract_id,
                capital_type = %plan.capital_type,
                book_value = %plan.book_value,
                unit_price = %plan.unit_price,
                units = %plan.units,
                fiat_value = %plan.fiat_value,
                "Capital transferred"
            );
        }

        self.notify(&contract, contract.seller, TransferRole::Seller)
            .await;
        self.notify(&contract, contract.buyer, TransferRole::Buyer)
            .await;
        self.events.publish(CoreEvent::TransferExecuted {
            contract_id,
            transaction_ids: transaction_ids.clone(),
        });

        Ok(ExecutionOutcome {
            contract_id,
            transaction_ids,
            recovered: false,
        })
    }

    /// Returns the linked transaction ids when an earlier run committed the
    /// transfer but did not complete the contract.
    async fn already_posted(
        &self,
        contract: &CapitalTransferContract,
    ) -> Result<Option<Vec<TransactionId>>, CapitalTransferError> {
        let Some(first) = contract.transfer_amounts.first() else {
            return Ok(None);
        };
        let probe = line_reference(contract.id, first.capital_type, 0);
        if !self
            .ledger
            .has_entry(probe, TransactionType::CapitalWithdrawn)
            .await?
        {
            return Ok(None);
        }

        let mut ids = Vec::new();
        for (index, line) in contract.transfer_amounts.iter().enumerate() {
            let reference = line_reference(contract.id, line.capital_type, index);
            for transaction_type in [
                TransactionType::CapitalWithdrawn,
                TransactionType::CapitalAcquired,
            ] {
                if let Some(id) = self.ledger.find_entry(reference, transaction_type).await? {
                    ids.push(id);
                }
            }
        }
        Ok(Some(ids))
    }

    /// Sizes every line against the seller's holdings, consuming them as
    /// lines of the same capital type are planned.
    async fn plan(
        &self,
        contract: &CapitalTransferContract,
    ) -> Result<Vec<LinePlan>, CapitalTransferError> {
        let mut remaining: BTreeMap<CapitalType, Holding> = BTreeMap::new();
        let mut plans = Vec::with_capacity(contract.transfer_amounts.len());

        for (index, line) in contract.transfer_amounts.iter().enumerate() {
            let holding = match remaining.get(&line.capital_type) {
                Some(holding) => *holding,
                None => self.holding(contract.seller, line.capital_type).await?,
            };
            if holding.fiat < line.book_value {
                return Err(CapitalTransferError::InsufficientCapital {
                    capital_type: line.capital_type,
                    requested: line.book_value,
                    available: holding.fiat,
                });
            }

            let requested = requested_units(line.book_value, line.unit_price)?;
            let units = clamp_units(requested, holding.units, line.unit_price, self.tolerance)?;
            if units != requested {
                info!(
                    contract_id = %contract.id,
                    capital_type = %line.capital_type,
                    requested = %requested,
                    available = %holding.units,
                    "Clamped transfer units to seller holding"
                );
            }
            let fiat_value = proportional_fiat_value(holding.fiat, units, holding.units)?;

            remaining.insert(
                line.capital_type,
                Holding {
                    fiat: holding.fiat - fiat_value,
                    units: holding.units - units,
                },
            );
            plans.push(LinePlan {
                capital_type: line.capital_type,
                reference: line_reference(contract.id, line.capital_type, index),
                book_value: line.book_value,
                unit_price: line.unit_price,
                units,
                fiat_value,
            });
        }
        Ok(plans)
    }

    async fn holding(
        &self,
        member: UserId,
        capital_type: CapitalType,
    ) -> Result<Holding, CapitalTransferError> {
        let fiat = self
            .ledger
            .balance(&capital_account(member, capital_type, AssetType::Currency))
            .await?;
        let units = self
            .ledger
            .balance(&capital_account(member, capital_type, AssetType::FundUnit))
            .await?;
        Ok(Holding {
            fiat: -fiat,
            units: -units,
        })
    }

    async fn notify(
        &self,
        contract: &CapitalTransferContract,
        recipient: UserId,
        role: TransferRole,
    ) {
        if let Err(err) = self.notifier.notify(recipient, role, contract).await {
            warn!(
                contract_id = %contract.id,
                recipient = %recipient,
                role = role.as_str(),
                error = %err,
                "Failed to notify transfer party"
            );
        }
    }
}

fn line_reference(
    contract_id: ContractId,
    capital_type: CapitalType,
    index: usize,
) -> ExternalReference {
    ExternalReference::from_natural_key(&format!("{contract_id}:{capital_type}:{index}"))
}

fn capital_account(
    member: UserId,
    capital_type: CapitalType,
    asset_type: AssetType,
) -> LedgerAccount {
    LedgerAccount::user(member, AccountPurpose::Capital(capital_type), asset_type)
}

fn clearing_account(asset_type: AssetType) -> LedgerAccount {
    LedgerAccount::system(AccountPurpose::CapitalTransferClearing, asset_type)
}

/// Seller leg and buyer leg of one line, both netting through clearing.
fn transfer_transactions(
    contract: &CapitalTransferContract,
    plan: &LinePlan,
) -> [NewTransaction; 2] {
    let metadata = json!({
        "contractId": contract.id,
        "capitalType": plan.capital_type,
        "bookValue": plan.book_value,
        "unitPrice": plan.unit_price,
        "units": plan.units,
        "fiatValue": plan.fiat_value,
    });
    let seller = |asset| capital_account(contract.seller, plan.capital_type, asset);
    let buyer = |asset| capital_account(contract.buyer, plan.capital_type, asset);

    let withdrawn = NewTransaction::new(TransactionType::CapitalWithdrawn, plan.reference)
        .posting(seller(AssetType::Currency), plan.fiat_value)
        .posting(seller(AssetType::FundUnit), plan.units)
        .posting(clearing_account(AssetType::Currency), -plan.fiat_value)
        .posting(clearing_account(AssetType::FundUnit), -plan.units)
        .with_metadata(metadata.clone());
    let acquired = NewTransaction::new(TransactionType::CapitalAcquired, plan.reference)
        .posting(clearing_account(AssetType::Currency), plan.fiat_value)
        .posting(clearing_account(AssetType::FundUnit), plan.units)
        .posting(buyer(AssetType::Currency), -plan.fiat_value)
        .posting(buyer(AssetType::FundUnit), -plan.units)
        .with_metadata(metadata);
    [withdrawn, acquired]
}
