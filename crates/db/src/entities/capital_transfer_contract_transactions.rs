//! `SeaORM` Entity for capital_transfer_contract_transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "capital_transfer_contract_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub contract_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::capital_transfer_contracts::Entity",
        from = "Column::ContractId",
        to = "super::capital_transfer_contracts::Column::Id"
    )]
    CapitalTransferContracts,
    #[sea_orm(
        belongs_to = "super::ledger_transactions::Entity",
        from = "Column::TransactionId",
        to = "super::ledger_transactions::Column::Id"
    )]
    LedgerTransactions,
}

impl Related<super::capital_transfer_contracts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CapitalTransferContracts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
