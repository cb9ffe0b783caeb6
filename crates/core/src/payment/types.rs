//! Payment and payment return types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use pillar_shared::types::{PaymentId, PaymentReturnId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{BankAccountType, ExternalReference};

/// Payment lifecycle. Only the return path is driven by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Seen on a statement.
    Received,
    /// Matched to a member and checked.
    Verified,
    /// Rejected and queued for return to the payer.
    ToBeReturned,
    /// Returned by the bank.
    Returned,
    /// Successfully applied.
    Processed,
}

impl PaymentStatus {
    /// All statuses.
    pub const ALL: [Self; 5] = [
        Self::Received,
        Self::Verified,
        Self::ToBeReturned,
        Self::Returned,
        Self::Processed,
    ];

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Verified => "VERIFIED",
            Self::ToBeReturned => "TO_BE_RETURNED",
            Self::Returned => "RETURNED",
            Self::Processed => "PROCESSED",
        }
    }

    /// Parses a status from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Whether a bank return can still be applied to a payment in this status.
    #[must_use]
    pub fn is_returnable(&self) -> bool {
        matches!(self, Self::Received | Self::Verified | Self::ToBeReturned)
    }

    /// Checks if a transition to the target status is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Received, Self::Verified | Self::ToBeReturned | Self::Returned)
                | (
                    Self::Verified,
                    Self::ToBeReturned | Self::Returned | Self::Processed
                )
                | (Self::ToBeReturned, Self::Returned)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment owned by the payments subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID.
    pub id: PaymentId,
    /// Owning member, if attributed.
    pub user_id: Option<UserId>,
    /// Positive amount in the settlement currency.
    pub amount: Decimal,
    /// IBAN the payment was sent to.
    pub beneficiary_iban: String,
    /// End-to-end id assigned when the payment was initiated.
    pub end_to_end_id: Option<String>,
    /// Current status.
    pub status: PaymentStatus,
    /// When the payment was created.
    pub created_at: DateTime<Utc>,
}

/// A returned payment observed on a statement, waiting to be matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReturn {
    /// Return ID.
    pub id: PaymentReturnId,
    /// Reference of the statement entry; unique per return.
    pub external_reference: ExternalReference,
    /// Fund account the returned money arrived on.
    pub bank_account: BankAccountType,
    /// End-to-end id of the original payment, when the bank echoed it.
    pub end_to_end_id: Option<String>,
    /// IBAN of the original beneficiary.
    pub beneficiary_iban: Option<String>,
    /// Positive amount returned.
    pub amount: Decimal,
    /// Remittance text of the return entry.
    pub remittance_information: String,
    /// Booking date of the return entry.
    pub booked_on: NaiveDate,
    /// Payment the return was matched to.
    pub matched_payment_id: Option<PaymentId>,
}

/// How a return was linked to its payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Exact end-to-end id.
    EndToEndId,
    /// Beneficiary IBAN and amount, single candidate.
    IbanAndAmount,
}

impl MatchMethod {
    /// Returns the string representation used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndToEndId => "end_to_end_id",
            Self::IbanAndAmount => "iban_and_amount",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PaymentStatus::Received, PaymentStatus::Returned, true)]
    #[case(PaymentStatus::Verified, PaymentStatus::Returned, true)]
    #[case(PaymentStatus::ToBeReturned, PaymentStatus::Returned, true)]
    #[case(PaymentStatus::Received, PaymentStatus::Verified, true)]
    #[case(PaymentStatus::Verified, PaymentStatus::Processed, true)]
    #[case(PaymentStatus::Processed, PaymentStatus::Returned, false)]
    #[case(PaymentStatus::Returned, PaymentStatus::Returned, false)]
    #[case(PaymentStatus::Returned, PaymentStatus::Received, false)]
    #[case(PaymentStatus::ToBeReturned, PaymentStatus::Verified, false)]
    fn test_transitions(
        #[case] from: PaymentStatus,
        #[case] to: PaymentStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_returnable_states() {
        let returnable: Vec<_> = PaymentStatus::ALL
            .into_iter()
            .filter(PaymentStatus::is_returnable)
            .collect();
        assert_eq!(
            returnable,
            vec![
                PaymentStatus::Received,
                PaymentStatus::Verified,
                PaymentStatus::ToBeReturned
            ]
        );
    }

    #[test]
    fn test_status_round_trip() {
        for status in PaymentStatus::ALL {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
    }
}
