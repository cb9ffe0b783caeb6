//! Capital transfer contract repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pillar_core::RepositoryError;
use pillar_core::capital::{
    CapitalTransferAmount, CapitalTransferContract, ContractRepository, ContractState,
};
use pillar_shared::types::{ContractId, TransactionId, UserId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use tracing::info;

use crate::entities::{capital_transfer_contract_transactions, capital_transfer_contracts};

fn storage(err: DbErr) -> RepositoryError {
    RepositoryError::Storage(err.to_string())
}

/// Contract repository backed by PostgreSQL.
#[derive(Clone)]
pub struct SeaContractRepository {
    db: DatabaseConnection,
}

impl SeaContractRepository {
    /// Creates a new contract repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores a contract handed over by the contract workflow.
    ///
    /// # Errors
    ///
    /// Returns an error if the lines cannot be encoded or the insert fails.
    pub async fn insert(&self, contract: &CapitalTransferContract) -> Result<(), RepositoryError> {
        let lines = serde_json::to_value(&contract.transfer_amounts)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let updated_at = contract.updated_at.into();
        let model = capital_transfer_contracts::ActiveModel {
            id: Set(contract.id.into_inner()),
            seller_id: Set(contract.seller.into_inner()),
            buyer_id: Set(contract.buyer.into_inner()),
            transfer_amounts: Set(lines),
            state: Set(contract.state.as_str().to_string()),
            created_at: Set(updated_at),
            updated_at: Set(updated_at),
        };
        capital_transfer_contracts::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(storage)?;
        Ok(())
    }

    /// Transactions linked to a contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn links(&self, id: ContractId) -> Result<Vec<TransactionId>, RepositoryError> {
        let rows = capital_transfer_contract_transactions::Entity::find()
            .filter(capital_transfer_contract_transactions::Column::ContractId.eq(id.into_inner()))
            .all(&self.db)
            .await
            .map_err(storage)?;
        Ok(rows
            .into_iter()
            .map(|row| TransactionId::from_uuid(row.transaction_id))
            .collect())
    }
}

#[async_trait]
impl ContractRepository for SeaContractRepository {
    async fn find(
        &self,
        id: ContractId,
    ) -> Result<Option<CapitalTransferContract>, RepositoryError> {
        capital_transfer_contracts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(contract_from_model)
            .transpose()
    }

    async fn approved(&self) -> Result<Vec<CapitalTransferContract>, RepositoryError> {
        capital_transfer_contracts::Entity::find()
            .filter(capital_transfer_contracts::Column::State.eq(ContractState::Approved.as_str()))
            .order_by_asc(capital_transfer_contracts::Column::UpdatedAt)
            .order_by_asc(capital_transfer_contracts::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(contract_from_model)
            .collect()
    }

    async fn complete(
        &self,
        id: ContractId,
        transaction_ids: &[TransactionId],
        executed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await.map_err(storage)?;

        let updated = capital_transfer_contracts::Entity::update_many()
            .col_expr(
                capital_transfer_contracts::Column::State,
                Expr::value(ContractState::Executed.as_str()),
            )
            .col_expr(
                capital_transfer_contracts::Column::UpdatedAt,
                Expr::value(executed_at),
            )
            .filter(capital_transfer_contracts::Column::Id.eq(id.into_inner()))
            .filter(capital_transfer_contracts::Column::State.eq(ContractState::Approved.as_str()))
            .exec(&txn)
            .await
            .map_err(storage)?;

        if updated.rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Approved contract",
                id: id.to_string(),
            });
        }

        if !transaction_ids.is_empty() {
            let links = transaction_ids.iter().map(|transaction_id| {
                capital_transfer_contract_transactions::ActiveModel {
                    contract_id: Set(id.into_inner()),
                    transaction_id: Set(transaction_id.into_inner()),
                }
            });
            capital_transfer_contract_transactions::Entity::insert_many(links)
                .exec_without_returning(&txn)
                .await
                .map_err(storage)?;
        }

        txn.commit().await.map_err(storage)?;
        info!(contract_id = %id, transactions = transaction_ids.len(), "Contract marked executed");
        Ok(())
    }
}

fn contract_from_model(
    model: capital_transfer_contracts::Model,
) -> Result<CapitalTransferContract, RepositoryError> {
    let state = ContractState::parse(&model.state).ok_or_else(|| {
        RepositoryError::Storage(format!(
            "contract {} has unsupported state {}",
            model.id, model.state
        ))
    })?;
    let transfer_amounts: Vec<CapitalTransferAmount> =
        serde_json::from_value(model.transfer_amounts).map_err(|e| {
            RepositoryError::Storage(format!("contract {} has invalid lines: {e}", model.id))
        })?;

    Ok(CapitalTransferContract {
        id: ContractId::from_uuid(model.id),
        seller: UserId::from_uuid(model.seller_id),
        buyer: UserId::from_uuid(model.buyer_id),
        transfer_amounts,
        state,
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillar_core::capital::CapitalType;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use uuid::Uuid;

    fn model(state: &str, lines: serde_json::Value) -> capital_transfer_contracts::Model {
        capital_transfer_contracts::Model {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            transfer_amounts: lines,
            state: state.to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_contract_lines_are_read_from_json() {
        let contract = contract_from_model(model(
            "APPROVED",
            json!([{"type": "WORK_COMPENSATION", "bookValue": "100.00", "unitPrice": "1.25"}]),
        ))
        .unwrap();

        assert_eq!(contract.state, ContractState::Approved);
        assert_eq!(
            contract.transfer_amounts,
            vec![CapitalTransferAmount {
                capital_type: CapitalType::WorkCompensation,
                book_value: dec!(100.00),
                unit_price: dec!(1.25),
            }]
        );
    }

    #[test]
    fn test_workflow_states_are_rejected() {
        assert!(matches!(
            contract_from_model(model("SELLER_SIGNED", json!([]))),
            Err(RepositoryError::Storage(_))
        ));
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        assert!(matches!(
            contract_from_model(model("APPROVED", json!({"type": "PROFIT"}))),
            Err(RepositoryError::Storage(_))
        ));
    }
}
