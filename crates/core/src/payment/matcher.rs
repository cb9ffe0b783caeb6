//! Deferred return matching.
//!
//! Bank returns can arrive before the payment they return is known to the
//! core, so they are queued and matched after every statement batch. Each
//! queued return is handled in its own unit of work; a failure leaves that
//! item queued for the next run without affecting the others.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::error::ReturnMatchError;
use super::repository::PaymentRepository;
use super::types::{MatchMethod, Payment, PaymentReturn, PaymentStatus};
use crate::events::{CoreEvent, EventPublisher};
use crate::ledger::{
    AccountPurpose, AssetType, ExternalReference, LedgerAccount, LedgerStore, NewTransaction,
    TransactionType,
};

/// Counts from one matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchingReport {
    /// Returns linked to a payment.
    pub matched: usize,
    /// Ledger transactions written.
    pub posted: usize,
    /// Returns with no resolvable payment.
    pub unresolved: usize,
    /// Returns that failed and stay queued.
    pub failed: usize,
}

enum ItemOutcome {
    Matched { posted: bool },
    Unresolved,
}

/// Reconciles queued bank returns with their originating payments.
pub struct DeferredReturnMatcher {
    ledger: Arc<dyn LedgerStore>,
    payments: Arc<dyn PaymentRepository>,
    events: Arc<dyn EventPublisher>,
}

impl DeferredReturnMatcher {
    /// Creates a matcher.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        payments: Arc<dyn PaymentRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            payments,
            events,
        }
    }

    /// Runs one pass over the unresolved return queue.
    ///
    /// # Errors
    ///
    /// Fails when the queue cannot be loaded or a ledger balance violation
    /// occurs. Every other per-item error is logged and counted.
    pub async fn run(&self) -> Result<MatchingReport, ReturnMatchError> {
        let queue = self.payments.unmatched_returns().await?;
        let mut report = MatchingReport::default();

        for item in &queue {
            match self.match_one(item).await {
                Ok(ItemOutcome::Matched { posted }) => {
                    report.matched += 1;
                    if posted {
                        report.posted += 1;
                    }
                }
                Ok(ItemOutcome::Unresolved) => report.unresolved += 1,
                Err(err) if err.is_fatal() => {
                    error!(
                        return_id = %item.id,
                        amount = %item.amount,
                        error = %err,
                        "Ledger rejected return posting"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        return_id = %item.id,
                        amount = %item.amount,
                        code = err.error_code(),
                        error = %err,
                        "Failed to match return, will retry"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            queued = queue.len(),
            matched = report.matched,
            posted = report.posted,
            unresolved = report.unresolved,
            failed = report.failed,
            "Deferred return matching completed"
        );
        self.events.publish(CoreEvent::ReturnMatchingCompleted {
            matched: report.matched,
            unresolved: report.unresolved,
            failed: report.failed,
        });
        Ok(report)
    }

    async fn match_one(&self, item: &PaymentReturn) -> Result<ItemOutcome, ReturnMatchError> {
        let Some((payment, method)) = self.resolve(item).await? else {
            info!(
                return_id = %item.id,
                end_to_end_id = ?item.end_to_end_id,
                beneficiary_iban = ?item.beneficiary_iban,
                amount = %item.amount,
                "No payment found for return, leaving for next batch"
            );
            return Ok(ItemOutcome::Unresolved);
        };
        info!(
            return_id = %item.id,
            payment_id = %payment.id,
            method = method.as_str(),
            "Matched return to payment"
        );

        let posted = self.post_return(item, &payment).await?;
        self.advance_to_returned(&payment).await?;
        self.payments.mark_return_matched(item.id, payment.id).await?;
        Ok(ItemOutcome::Matched { posted })
    }

    /// End-to-end id first; IBAN and amount only with a single candidate.
    async fn resolve(
        &self,
        item: &PaymentReturn,
    ) -> Result<Option<(Payment, MatchMethod)>, ReturnMatchError> {
        if let Some(end_to_end_id) = &item.end_to_end_id
            && let Some(payment) = self.payments.find_by_end_to_end_id(end_to_end_id).await?
        {
            return Ok(Some((payment, MatchMethod::EndToEndId)));
        }

        let Some(iban) = &item.beneficiary_iban else {
            return Ok(None);
        };
        let mut candidates = self
            .payments
            .find_returnable_by_iban_and_amount(iban, item.amount)
            .await?;
        if candidates.len() > 1 {
            warn!(
                return_id = %item.id,
                candidates = candidates.len(),
                "Ambiguous IBAN and amount match, leaving for manual resolution"
            );
            return Ok(None);
        }
        Ok(candidates.pop().map(|p| (p, MatchMethod::IbanAndAmount)))
    }

    /// Posts the return unless either return type already exists for the
    /// payment. Returns whether a transaction was written.
    async fn post_return(
        &self,
        item: &PaymentReturn,
        payment: &Payment,
    ) -> Result<bool, ReturnMatchError> {
        let reference = ExternalReference::from_uuid(payment.id.into_inner());
        for existing in [
            TransactionType::PaymentBounceBack,
            TransactionType::PaymentCancelled,
        ] {
            if self.ledger.has_entry(reference, existing).await? {
                info!(
                    payment_id = %payment.id,
                    transaction_type = %existing,
                    "Return already posted"
                );
                return Ok(false);
            }
        }

        let transaction = return_transaction(item, payment, reference);
        let posted = self.ledger.post_once(transaction).await?;
        if let Some(posted) = &posted {
            info!(
                payment_id = %payment.id,
                transaction_id = %posted.id,
                transaction_type = %posted.transaction_type,
                amount = %item.amount,
                "Posted payment return"
            );
        }
        Ok(posted.is_some())
    }

    async fn advance_to_returned(&self, payment: &Payment) -> Result<(), ReturnMatchError> {
        if payment.status == PaymentStatus::Returned {
            return Ok(());
        }
        if !payment.status.can_transition_to(PaymentStatus::Returned) {
            warn!(
                payment_id = %payment.id,
                status = %payment.status,
                "Payment cannot move to RETURNED, status left unchanged"
            );
            return Ok(());
        }
        self.payments
            .update_status(payment.id, PaymentStatus::Returned)
            .await?;
        Ok(())
    }
}

/// Cancellation for member payments, bounce-back otherwise. The returned
/// cash lands on the clearing account of the receiving bank account.
fn return_transaction(
    item: &PaymentReturn,
    payment: &Payment,
    reference: ExternalReference,
) -> NewTransaction {
    let (transaction_type, counter) = match payment.user_id {
        Some(user_id) => (
            TransactionType::PaymentCancelled,
            LedgerAccount::user(user_id, AccountPurpose::UserCash, AssetType::Currency),
        ),
        None => (
            TransactionType::PaymentBounceBack,
            LedgerAccount::system(AccountPurpose::UnattributedReturns, AssetType::Currency),
        ),
    };
    let amount = item.amount;
    NewTransaction::new(transaction_type, reference)
        .posting(LedgerAccount::clearing(item.bank_account), amount)
        .posting(counter, -amount)
        .with_metadata(json!({
            "paymentId": payment.id,
            "returnId": item.id,
            "returnReference": item.external_reference,
        }))
}
