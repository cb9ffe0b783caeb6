//! Payment persistence seam and its in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use pillar_shared::types::{PaymentId, PaymentReturnId};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::types::{Payment, PaymentReturn, PaymentStatus};
use crate::repository::RepositoryError;

/// Access to payments and the deferred return queue.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Queues a return. Returns `false` when a return with the same
    /// external reference is already queued.
    async fn record_return(&self, item: PaymentReturn) -> Result<bool, RepositoryError>;

    /// Returns not yet matched to a payment, oldest first.
    async fn unmatched_returns(&self) -> Result<Vec<PaymentReturn>, RepositoryError>;

    /// Finds a payment by end-to-end id.
    async fn find_by_end_to_end_id(
        &self,
        end_to_end_id: &str,
    ) -> Result<Option<Payment>, RepositoryError>;

    /// Payments to `beneficiary_iban` of exactly `amount` in a returnable status.
    async fn find_returnable_by_iban_and_amount(
        &self,
        beneficiary_iban: &str,
        amount: Decimal,
    ) -> Result<Vec<Payment>, RepositoryError>;

    /// Sets the status of a payment.
    async fn update_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError>;

    /// Links a queued return to its payment, removing it from the queue.
    async fn mark_return_matched(
        &self,
        return_id: PaymentReturnId,
        payment_id: PaymentId,
    ) -> Result<(), RepositoryError>;
}

/// Payment repository kept in memory.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: RwLock<HashMap<PaymentId, Payment>>,
    returns: RwLock<Vec<PaymentReturn>>,
}

impl InMemoryPaymentRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces a payment.
    pub async fn insert_payment(&self, payment: Payment) {
        self.payments.write().await.insert(payment.id, payment);
    }

    /// Loads a payment.
    pub async fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.payments.read().await.get(&id).cloned()
    }

    /// Every queued return, matched or not.
    pub async fn returns(&self) -> Vec<PaymentReturn> {
        self.returns.read().await.clone()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn record_return(&self, item: PaymentReturn) -> Result<bool, RepositoryError> {
        let mut returns = self.returns.write().await;
        if returns
            .iter()
            .any(|r| r.external_reference == item.external_reference)
        {
            return Ok(false);
        }
        returns.push(item);
        Ok(true)
    }

    async fn unmatched_returns(&self) -> Result<Vec<PaymentReturn>, RepositoryError> {
        Ok(self
            .returns
            .read()
            .await
            .iter()
            .filter(|r| r.matched_payment_id.is_none())
            .cloned()
            .collect())
    }

    async fn find_by_end_to_end_id(
        &self,
        end_to_end_id: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.end_to_end_id.as_deref() == Some(end_to_end_id))
            .cloned())
    }

    async fn find_returnable_by_iban_and_amount(
        &self,
        beneficiary_iban: &str,
        amount: Decimal,
    ) -> Result<Vec<Payment>, RepositoryError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .filter(|p| {
                p.beneficiary_iban == beneficiary_iban
                    && p.amount == amount
                    && p.status.is_returnable()
            })
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let mut payments = self.payments.write().await;
        let payment = payments.get_mut(&id).ok_or_else(|| RepositoryError::NotFound {
            entity: "Payment",
            id: id.to_string(),
        })?;
        payment.status = status;
        Ok(())
    }

    async fn mark_return_matched(
        &self,
        return_id: PaymentReturnId,
        payment_id: PaymentId,
    ) -> Result<(), RepositoryError> {
        let mut returns = self.returns.write().await;
        let item = returns
            .iter_mut()
            .find(|r| r.id == return_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "PaymentReturn",
                id: return_id.to_string(),
            })?;
        item.matched_payment_id = Some(payment_id);
        Ok(())
    }
}
