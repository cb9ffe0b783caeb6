//! `SeaORM` Entity for payments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(None)")]
    pub amount: Decimal,
    pub beneficiary_iban: String,
    pub end_to_end_id: Option<String>,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment_returns::Entity")]
    PaymentReturns,
}

impl Related<super::payment_returns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentReturns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
