//! Bank operation processing.
//!
//! Turns bank-originated statement entries (interest, fees, adjustments,
//! fund trade settlements) into ledger transactions against the clearing
//! account of the statement's bank account. Member payments are left to
//! the payment flow and returned payments are queued for deferred matching.

use std::sync::Arc;

use pillar_shared::types::PaymentReturnId;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::classification::{EntryAction, SubFamilyCode};
use super::error::ProcessingError;
use super::registry::BankAccountRegistry;
use super::statement::{BankStatement, BankStatementEntry};
use super::ticker::resolve_ticker;
use crate::ledger::{
    AccountPurpose, AssetType, BankAccountType, ExternalReference, LedgerAccount, LedgerStore,
    NewTransaction, TransactionType,
};
use crate::payment::{PaymentRepository, PaymentReturn};

/// Why an entry needs a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ManualReviewReason {
    /// No single fund ticker in the remittance text of a trade settlement.
    UnresolvedTicker,
    /// Entry is not in the settlement currency.
    ForeignCurrency(String),
}

/// An entry skipped pending manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualReviewItem {
    /// Bank reference of the entry.
    pub external_id: String,
    /// Sub-family code of the entry.
    pub sub_family_code: String,
    /// Signed amount as reported.
    pub amount: Decimal,
    /// Remittance text as reported.
    pub remittance_information: String,
    /// Why the entry was not posted.
    pub reason: ManualReviewReason,
}

/// Outcome of processing one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingReport {
    /// Statement id.
    pub statement_id: String,
    /// Account the statement belongs to.
    pub account_iban: String,
    /// Transactions written.
    pub posted: usize,
    /// Entries already present in the ledger.
    pub duplicates: usize,
    /// Entries without a code or handled by the payment flow.
    pub skipped: usize,
    /// Entries with a code outside the mapped set.
    pub unmapped: usize,
    /// Returned payments newly queued for matching.
    pub returns_queued: usize,
    /// Entries that failed and will be retried with the next delivery.
    pub failed: usize,
    /// Entries flagged for manual review.
    pub manual_review: Vec<ManualReviewItem>,
}

enum EntryOutcome {
    Posted,
    Duplicate,
    Skipped,
    Unmapped,
    ManualReview(ManualReviewReason),
    ReturnQueued,
    ReturnAlreadyQueued,
}

/// Classifies statement entries and posts bank operations to the ledger.
pub struct BankOperationProcessor {
    ledger: Arc<dyn LedgerStore>,
    payments: Arc<dyn PaymentRepository>,
    registry: BankAccountRegistry,
    settlement_currency: String,
}

impl BankOperationProcessor {
    /// Creates a processor.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        payments: Arc<dyn PaymentRepository>,
        registry: BankAccountRegistry,
        settlement_currency: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            payments,
            registry,
            settlement_currency: settlement_currency.into(),
        }
    }

    /// Processes every entry of a statement.
    ///
    /// Each entry is an independent unit of work: a failed entry is logged
    /// and counted without affecting the others.
    ///
    /// # Errors
    ///
    /// `UnknownAccount` when the statement IBAN is not configured, and
    /// ledger balance violations, which indicate a defect and abort the run.
    pub async fn process(
        &self,
        statement: &BankStatement,
    ) -> Result<ProcessingReport, ProcessingError> {
        let bank_account = self
            .registry
            .account_type(&statement.account_iban)
            .ok_or_else(|| ProcessingError::UnknownAccount(statement.account_iban.clone()))?;

        let mut report = ProcessingReport {
            statement_id: statement.statement_id.clone(),
            account_iban: statement.account_iban.clone(),
            ..ProcessingReport::default()
        };

        for entry in &statement.entries {
            match self.process_entry(statement, bank_account, entry).await {
                Ok(EntryOutcome::Posted) => report.posted += 1,
                Ok(EntryOutcome::Duplicate) => report.duplicates += 1,
                Ok(EntryOutcome::Skipped) => report.skipped += 1,
                Ok(EntryOutcome::Unmapped) => report.unmapped += 1,
                Ok(EntryOutcome::ReturnQueued) => report.returns_queued += 1,
                Ok(EntryOutcome::ReturnAlreadyQueued) => report.duplicates += 1,
                Ok(EntryOutcome::ManualReview(reason)) => {
                    warn!(
                        external_id = %entry.external_id,
                        amount = %entry.amount,
                        reason = ?reason,
                        "Entry flagged for manual review"
                    );
                    report.manual_review.push(ManualReviewItem {
                        external_id: entry.external_id.clone(),
                        sub_family_code: entry.sub_family_code.clone().unwrap_or_default(),
                        amount: entry.amount,
                        remittance_information: entry.remittance_information.clone(),
                        reason,
                    });
                }
                Err(err) if err.is_fatal() => {
                    error!(
                        external_id = %entry.external_id,
                        amount = %entry.amount,
                        error = %err,
                        "Ledger rejected bank operation"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        external_id = %entry.external_id,
                        amount = %entry.amount,
                        code = err.error_code(),
                        error = %err,
                        "Failed to process statement entry"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            statement_id = %report.statement_id,
            account_iban = %report.account_iban,
            entries = statement.entries.len(),
            posted = report.posted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            unmapped = report.unmapped,
            returns_queued = report.returns_queued,
            manual_review = report.manual_review.len(),
            failed = report.failed,
            "Bank statement processed"
        );
        Ok(report)
    }

    async fn process_entry(
        &self,
        statement: &BankStatement,
        bank_account: BankAccountType,
        entry: &BankStatementEntry,
    ) -> Result<EntryOutcome, ProcessingError> {
        if entry.details.is_some() {
            return Ok(EntryOutcome::Skipped);
        }
        let Some(raw_code) = entry.sub_family_code.as_deref() else {
            return Ok(EntryOutcome::Skipped);
        };
        let Some(code) = SubFamilyCode::parse(raw_code) else {
            info!(
                external_id = %entry.external_id,
                sub_family_code = raw_code,
                "Unmapped sub-family code, skipping entry"
            );
            return Ok(EntryOutcome::Unmapped);
        };
        if entry.currency != self.settlement_currency {
            return Ok(EntryOutcome::ManualReview(
                ManualReviewReason::ForeignCurrency(entry.currency.clone()),
            ));
        }

        let context = EntryContext {
            statement,
            bank_account,
            entry,
            reference: ExternalReference::for_bank_entry(
                &statement.account_iban,
                &entry.external_id,
            ),
            amount: normalize_amount(entry),
        };

        match code.action() {
            EntryAction::QueueReturn => self.queue_return(&context).await,
            EntryAction::Post(transaction_type) => {
                self.post_operation(&context, code, transaction_type).await
            }
        }
    }

    async fn post_operation(
        &self,
        context: &EntryContext<'_>,
        code: SubFamilyCode,
        transaction_type: TransactionType,
    ) -> Result<EntryOutcome, ProcessingError> {
        let EntryContext {
            statement,
            bank_account,
            entry,
            reference,
            amount,
        } = *context;

        if self.ledger.has_entry(reference, transaction_type).await? {
            debug!(
                external_id = %entry.external_id,
                transaction_type = %transaction_type,
                "Bank operation already posted"
            );
            return Ok(EntryOutcome::Duplicate);
        }

        let counter_purpose = match transaction_type {
            TransactionType::InterestReceived => AccountPurpose::InterestIncome,
            TransactionType::BankFee => AccountPurpose::FeesExpense,
            TransactionType::BankAdjustment => AccountPurpose::BankAdjustment,
            TransactionType::TradeSettlement => {
                match resolve_ticker(&entry.remittance_information) {
                    Some(ticker) => AccountPurpose::TradeSettlement(ticker),
                    None => {
                        return Ok(EntryOutcome::ManualReview(
                            ManualReviewReason::UnresolvedTicker,
                        ));
                    }
                }
            }
            TransactionType::PaymentBounceBack
            | TransactionType::PaymentCancelled
            | TransactionType::CapitalAcquired
            | TransactionType::CapitalWithdrawn => {
                return Err(ProcessingError::UnsupportedTransactionType(
                    transaction_type,
                ));
            }
        };

        let transaction = NewTransaction::new(transaction_type, reference)
            .posting(LedgerAccount::clearing(bank_account), amount)
            .posting(
                LedgerAccount::system(counter_purpose, AssetType::Currency),
                -amount,
            )
            .with_metadata(json!({
                "statementId": statement.statement_id,
                "accountIban": statement.account_iban,
                "externalId": entry.external_id,
                "subFamilyCode": code.as_str(),
                "reportedAmount": entry.amount,
                "remittanceInformation": entry.remittance_information,
                "bookingDate": entry.booking_date,
            }));

        match self.ledger.post_once(transaction).await? {
            Some(posted) => {
                info!(
                    transaction_id = %posted.id,
                    transaction_type = %transaction_type,
                    external_id = %entry.external_id,
                    amount = %amount,
                    counter_account = %counter_purpose,
                    "Posted bank operation"
                );
                Ok(EntryOutcome::Posted)
            }
            // Another worker committed the same entry after the pre-check.
            None => Ok(EntryOutcome::Duplicate),
        }
    }

    async fn queue_return(
        &self,
        context: &EntryContext<'_>,
    ) -> Result<EntryOutcome, ProcessingError> {
        let entry = context.entry;
        let item = PaymentReturn {
            id: PaymentReturnId::new(),
            external_reference: context.reference,
            bank_account: context.bank_account,
            end_to_end_id: entry.end_to_end_id.clone(),
            beneficiary_iban: entry.counter_party.iban.clone(),
            amount: context.amount.abs(),
            remittance_information: entry.remittance_information.clone(),
            booked_on: entry.booking_date,
            matched_payment_id: None,
        };
        if self.payments.record_return(item).await? {
            info!(
                external_id = %entry.external_id,
                end_to_end_id = ?entry.end_to_end_id,
                amount = %context.amount,
                "Queued returned payment for matching"
            );
            Ok(EntryOutcome::ReturnQueued)
        } else {
            Ok(EntryOutcome::ReturnAlreadyQueued)
        }
    }
}

/// Everything derived from one entry before it is acted on.
#[derive(Clone, Copy)]
struct EntryContext<'a> {
    statement: &'a BankStatement,
    bank_account: BankAccountType,
    entry: &'a BankStatementEntry,
    reference: ExternalReference,
    amount: Decimal,
}

/// Rounds to cents, half away from zero, logging any change.
fn normalize_amount(entry: &BankStatementEntry) -> Decimal {
    let normalized = entry
        .amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if normalized != entry.amount {
        info!(
            external_id = %entry.external_id,
            reported = %entry.amount,
            normalized = %normalized,
            "Normalized entry amount to two decimal places"
        );
    }
    normalized
}
