//! `SeaORM` Entity for capital_transfer_contracts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "capital_transfer_contracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    /// Lines as `[{"type", "bookValue", "unitPrice"}]`.
    #[sea_orm(column_type = "JsonBinary")]
    pub transfer_amounts: Json,
    pub state: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::capital_transfer_contract_transactions::Entity")]
    ContractTransactions,
}

impl Related<super::capital_transfer_contract_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContractTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
