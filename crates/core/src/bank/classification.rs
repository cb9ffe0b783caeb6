//! Bank transaction code classification.

use serde::{Deserialize, Serialize};

use crate::ledger::TransactionType;

/// ISO bank transaction sub-family codes the processor acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubFamilyCode {
    /// Interest.
    Intr,
    /// Fees.
    Fees,
    /// Commission.
    Comm,
    /// Adjustment.
    Adjt,
    /// Trade.
    Trad,
    /// Subscription.
    Subs,
    /// Returned payment.
    Rrtn,
}

/// What the processor does with an entry of a given code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// Post a ledger transaction of this type.
    Post(TransactionType),
    /// Record the entry in the deferred return queue.
    QueueReturn,
}

impl SubFamilyCode {
    /// Parses a code as found in `BkTxCd/Domn/Fmly/SubFmlyCd`.
    ///
    /// Codes outside the mapped set return `None` and are skipped by the
    /// processor.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "INTR" => Some(Self::Intr),
            "FEES" => Some(Self::Fees),
            "COMM" => Some(Self::Comm),
            "ADJT" => Some(Self::Adjt),
            "TRAD" => Some(Self::Trad),
            "SUBS" => Some(Self::Subs),
            "RRTN" => Some(Self::Rrtn),
            _ => None,
        }
    }

    /// Returns the code as it appears in camt messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intr => "INTR",
            Self::Fees => "FEES",
            Self::Comm => "COMM",
            Self::Adjt => "ADJT",
            Self::Trad => "TRAD",
            Self::Subs => "SUBS",
            Self::Rrtn => "RRTN",
        }
    }

    /// Ledger transaction type posted for this code, if any.
    #[must_use]
    pub fn transaction_type(&self) -> Option<TransactionType> {
        match self {
            Self::Intr => Some(TransactionType::InterestReceived),
            Self::Fees | Self::Comm => Some(TransactionType::BankFee),
            Self::Adjt => Some(TransactionType::BankAdjustment),
            Self::Trad | Self::Subs => Some(TransactionType::TradeSettlement),
            Self::Rrtn => None,
        }
    }

    /// Processing action for this code.
    #[must_use]
    pub fn action(&self) -> EntryAction {
        self.transaction_type()
            .map_or(EntryAction::QueueReturn, EntryAction::Post)
    }
}
