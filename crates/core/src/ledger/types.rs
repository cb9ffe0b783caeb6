//! Ledger domain types for transaction creation and posting.
//!
//! A transaction is an immutable, balanced set of postings identified for
//! idempotency purposes by its external reference and type.

use std::fmt;

use chrono::{DateTime, Utc};
use pillar_shared::types::TransactionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::{AssetType, LedgerAccount};
use super::reference::ExternalReference;

/// Transaction type classification.
///
/// Together with the external reference this forms the idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Interest paid by the bank.
    InterestReceived,
    /// Bank fee or commission.
    BankFee,
    /// Bank-side correction.
    BankAdjustment,
    /// Cash leg of a fund unit trade.
    TradeSettlement,
    /// Outgoing payment rejected by the receiving bank, no owning member.
    PaymentBounceBack,
    /// Member payment returned as cancelled.
    PaymentCancelled,
    /// Buyer leg of a capital transfer.
    CapitalAcquired,
    /// Seller leg of a capital transfer.
    CapitalWithdrawn,
}

impl TransactionType {
    /// All transaction types.
    pub const ALL: [Self; 8] = [
        Self::InterestReceived,
        Self::BankFee,
        Self::BankAdjustment,
        Self::TradeSettlement,
        Self::PaymentBounceBack,
        Self::PaymentCancelled,
        Self::CapitalAcquired,
        Self::CapitalWithdrawn,
    ];

    /// Returns the string representation of the transaction type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InterestReceived => "INTEREST_RECEIVED",
            Self::BankFee => "BANK_FEE",
            Self::BankAdjustment => "BANK_ADJUSTMENT",
            Self::TradeSettlement => "TRADE_SETTLEMENT",
            Self::PaymentBounceBack => "PAYMENT_BOUNCE_BACK",
            Self::PaymentCancelled => "PAYMENT_CANCELLED",
            Self::CapitalAcquired => "CAPITAL_ACQUIRED",
            Self::CapitalWithdrawn => "CAPITAL_WITHDRAWN",
        }
    }

    /// Parses a transaction type from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signed entry against one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// The account affected.
    pub account: LedgerAccount,
    /// Signed amount; positive debits the account, negative credits it.
    pub amount: Decimal,
}

impl Posting {
    /// Creates a posting.
    #[must_use]
    pub const fn new(account: LedgerAccount, amount: Decimal) -> Self {
        Self { account, amount }
    }

    /// The asset type of the posted amount.
    #[must_use]
    pub const fn asset_type(&self) -> AssetType {
        self.account.asset_type
    }
}

/// A transaction that has not been posted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Transaction type.
    pub transaction_type: TransactionType,
    /// Idempotency key derived from the originating system.
    pub external_reference: ExternalReference,
    /// Ordered postings.
    pub postings: Vec<Posting>,
    /// Free-form context kept for audit (source ids, raw amounts).
    pub metadata: serde_json::Value,
}

impl NewTransaction {
    /// Starts an empty transaction.
    #[must_use]
    pub fn new(transaction_type: TransactionType, external_reference: ExternalReference) -> Self {
        Self {
            transaction_type,
            external_reference,
            postings: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Appends a posting.
    #[must_use]
    pub fn posting(mut self, account: LedgerAccount, amount: Decimal) -> Self {
        self.postings.push(Posting::new(account, amount));
        self
    }

    /// Attaches audit metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedTransaction {
    /// Transaction ID.
    pub id: TransactionId,
    /// Transaction type.
    pub transaction_type: TransactionType,
    /// Idempotency key.
    pub external_reference: ExternalReference,
    /// Ordered postings.
    pub postings: Vec<Posting>,
    /// Audit metadata.
    pub metadata: serde_json::Value,
    /// When the store committed the transaction.
    pub created_at: DateTime<Utc>,
}

/// A posting as seen from a single account, for statements and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPosting {
    /// The transaction the posting belongs to.
    pub transaction_id: TransactionId,
    /// Type of that transaction.
    pub transaction_type: TransactionType,
    /// Signed amount.
    pub amount: Decimal,
    /// When the transaction was committed.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::account::BankAccountType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_type_round_trip() {
        for t in TransactionType::ALL {
            assert_eq!(TransactionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TransactionType::parse("JOURNAL"), None);
    }

    #[test]
    fn test_builder_keeps_posting_order() {
        let clearing = LedgerAccount::clearing(BankAccountType::DepositEur);
        let income = LedgerAccount::system(
            crate::ledger::account::AccountPurpose::InterestIncome,
            AssetType::Currency,
        );
        let tx = NewTransaction::new(
            TransactionType::InterestReceived,
            ExternalReference::from_natural_key("EE1:X1"),
        )
        .posting(clearing, dec!(100.00))
        .posting(income, dec!(-100.00));

        assert_eq!(tx.postings.len(), 2);
        assert_eq!(tx.postings[0].account, clearing);
        assert_eq!(tx.postings[1].amount, dec!(-100.00));
        assert_eq!(tx.metadata, serde_json::Value::Null);
    }
}
