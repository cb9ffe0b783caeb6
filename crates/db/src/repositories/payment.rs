//! Payment repository.
//!
//! Payments themselves are written by the payments subsystem; this side
//! only reads them and moves their status. The return queue is owned here.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use pillar_core::RepositoryError;
use pillar_core::ledger::{BankAccountType, ExternalReference};
use pillar_core::payment::{Payment, PaymentRepository, PaymentReturn, PaymentStatus};
use pillar_shared::types::{PaymentId, PaymentReturnId, UserId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};
use tracing::debug;

use crate::entities::{payment_returns, payments};

fn storage(err: DbErr) -> RepositoryError {
    RepositoryError::Storage(err.to_string())
}

/// Payment repository backed by PostgreSQL.
#[derive(Clone)]
pub struct SeaPaymentRepository {
    db: DatabaseConnection,
}

impl SeaPaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores a payment. Used by fixtures and imports from the payments
    /// subsystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_payment(&self, payment: &Payment) -> Result<(), RepositoryError> {
        let created_at: DateTime<FixedOffset> = payment.created_at.into();
        let model = payments::ActiveModel {
            id: Set(payment.id.into_inner()),
            user_id: Set(payment.user_id.map(UserId::into_inner)),
            amount: Set(payment.amount),
            beneficiary_iban: Set(payment.beneficiary_iban.clone()),
            end_to_end_id: Set(payment.end_to_end_id.clone()),
            status: Set(payment.status.as_str().to_string()),
            created_at: Set(created_at),
        };
        payments::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(storage)?;
        Ok(())
    }

    /// Loads a payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed.
    pub async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        payments::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(payment_from_model)
            .transpose()
    }
}

#[async_trait]
impl PaymentRepository for SeaPaymentRepository {
    async fn record_return(&self, item: PaymentReturn) -> Result<bool, RepositoryError> {
        let model = payment_returns::ActiveModel {
            id: Set(item.id.into_inner()),
            external_reference: Set(item.external_reference.into_inner()),
            bank_account: Set(item.bank_account.as_str().to_string()),
            end_to_end_id: Set(item.end_to_end_id),
            beneficiary_iban: Set(item.beneficiary_iban),
            amount: Set(item.amount),
            remittance_information: Set(item.remittance_information),
            booked_on: Set(item.booked_on),
            matched_payment_id: Set(item.matched_payment_id.map(PaymentId::into_inner)),
            created_at: Set(Utc::now().into()),
        };

        let rows = payment_returns::Entity::insert(model)
            .on_conflict(
                OnConflict::column(payment_returns::Column::ExternalReference)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(storage)?;

        if rows == 0 {
            debug!(external_reference = %item.external_reference, "Return already queued");
        }
        Ok(rows == 1)
    }

    async fn unmatched_returns(&self) -> Result<Vec<PaymentReturn>, RepositoryError> {
        payment_returns::Entity::find()
            .filter(payment_returns::Column::MatchedPaymentId.is_null())
            .order_by_asc(payment_returns::Column::BookedOn)
            .order_by_asc(payment_returns::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(return_from_model)
            .collect()
    }

    async fn find_by_end_to_end_id(
        &self,
        end_to_end_id: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        payments::Entity::find()
            .filter(payments::Column::EndToEndId.eq(end_to_end_id))
            .order_by_asc(payments::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(payment_from_model)
            .transpose()
    }

    async fn find_returnable_by_iban_and_amount(
        &self,
        beneficiary_iban: &str,
        amount: Decimal,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let returnable: Vec<&str> = PaymentStatus::ALL
            .iter()
            .filter(|status| status.is_returnable())
            .map(PaymentStatus::as_str)
            .collect();

        payments::Entity::find()
            .filter(payments::Column::BeneficiaryIban.eq(beneficiary_iban))
            .filter(payments::Column::Amount.eq(amount))
            .filter(payments::Column::Status.is_in(returnable))
            .order_by_asc(payments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(payment_from_model)
            .collect()
    }

    async fn update_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let result = payments::Entity::update_many()
            .col_expr(payments::Column::Status, Expr::value(status.as_str()))
            .filter(payments::Column::Id.eq(id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(storage)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Payment",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_return_matched(
        &self,
        return_id: PaymentReturnId,
        payment_id: PaymentId,
    ) -> Result<(), RepositoryError> {
        let result = payment_returns::Entity::update_many()
            .col_expr(
                payment_returns::Column::MatchedPaymentId,
                Expr::value(payment_id.into_inner()),
            )
            .filter(payment_returns::Column::Id.eq(return_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(storage)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PaymentReturn",
                id: return_id.to_string(),
            });
        }
        Ok(())
    }
}

fn payment_from_model(model: payments::Model) -> Result<Payment, RepositoryError> {
    let status = PaymentStatus::parse(&model.status).ok_or_else(|| {
        RepositoryError::Storage(format!(
            "payment {} has unknown status {}",
            model.id, model.status
        ))
    })?;
    Ok(Payment {
        id: PaymentId::from_uuid(model.id),
        user_id: model.user_id.map(UserId::from_uuid),
        amount: model.amount,
        beneficiary_iban: model.beneficiary_iban,
        end_to_end_id: model.end_to_end_id,
        status,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn return_from_model(model: payment_returns::Model) -> Result<PaymentReturn, RepositoryError> {
    let bank_account = BankAccountType::parse(&model.bank_account).ok_or_else(|| {
        RepositoryError::Storage(format!(
            "payment return {} has unknown bank account {}",
            model.id, model.bank_account
        ))
    })?;
    Ok(PaymentReturn {
        id: PaymentReturnId::from_uuid(model.id),
        external_reference: ExternalReference::from_uuid(model.external_reference),
        bank_account,
        end_to_end_id: model.end_to_end_id,
        beneficiary_iban: model.beneficiary_iban,
        amount: model.amount,
        remittance_information: model.remittance_information,
        booked_on: model.booked_on,
        matched_payment_id: model.matched_payment_id.map(PaymentId::from_uuid),
    })
}
