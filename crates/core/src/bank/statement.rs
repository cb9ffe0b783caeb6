//! Normalized bank statement model.
//!
//! Statements are transient: they exist between parsing and processing and
//! are never persisted.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which ISO 20022 message a statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    /// camt.052 intra-day account report.
    IntradayReport,
    /// camt.053 end-of-day statement.
    Statement,
}

impl StatementKind {
    /// Returns the message identifier.
    #[must_use]
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::IntradayReport => "camt.052",
            Self::Statement => "camt.053",
        }
    }
}

/// Balance codes carried in `Bal/Tp/CdOrPrtry/Cd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceType {
    /// OPBD
    Opening,
    /// CLBD
    Closing,
    /// ITBD
    Interim,
    /// CLAV
    ClosingAvailable,
}

impl BalanceType {
    /// Parses an ISO balance code. Unknown codes return `None`.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "OPBD" => Some(Self::Opening),
            "CLBD" => Some(Self::Closing),
            "ITBD" => Some(Self::Interim),
            "CLAV" => Some(Self::ClosingAvailable),
            _ => None,
        }
    }
}

/// A balance reported on the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatementBalance {
    /// Balance code.
    pub balance_type: BalanceType,
    /// Signed amount; debit balances are negative.
    pub amount: Decimal,
    /// ISO 4217 currency.
    pub currency: String,
    /// Balance date.
    pub date: NaiveDate,
}

/// The other side of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterParty {
    /// Name as reported by the bank.
    pub name: String,
    /// Account of the counter-party, absent for bank-internal bookings.
    pub iban: Option<String>,
    /// National personal identification code, for private persons.
    pub personal_id: Option<String>,
}

/// Identification resolved at parse time that routes an entry to the
/// member payment flow instead of bank operation processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDetails {
    /// Personal identification code of the paying or receiving member.
    pub personal_id: String,
}

/// One booked entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatementEntry {
    /// Counter-party of the booking.
    pub counter_party: CounterParty,
    /// Signed amount; debits (money leaving the account) are negative.
    pub amount: Decimal,
    /// ISO 4217 currency.
    pub currency: String,
    /// Bank transaction sub-family code (`INTR`, `FEES`, ...).
    pub sub_family_code: Option<String>,
    /// Unstructured remittance information.
    pub remittance_information: String,
    /// Bank-assigned reference, unique per account.
    pub external_id: String,
    /// End-to-end id of the originating payment, when provided.
    pub end_to_end_id: Option<String>,
    /// Booking date.
    pub booking_date: NaiveDate,
    /// Member identification, when the entry belongs to the payment flow.
    pub details: Option<ResolvedDetails>,
}

/// A parsed camt.052 or camt.053 message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatement {
    /// Message type.
    pub kind: StatementKind,
    /// Statement or report id.
    pub statement_id: String,
    /// IBAN of the fund's account the statement belongs to.
    pub account_iban: String,
    /// Reported balances.
    pub balances: Vec<BankStatementBalance>,
    /// Booked entries in document order.
    pub entries: Vec<BankStatementEntry>,
}

impl BankStatement {
    /// Returns the first balance of the given type.
    #[must_use]
    pub fn balance(&self, balance_type: BalanceType) -> Option<&BankStatementBalance> {
        self.balances.iter().find(|b| b.balance_type == balance_type)
    }
}
