//! Capital transfer contract types.

use std::fmt;

use chrono::{DateTime, Utc};
use pillar_shared::types::{ContractId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kinds of member capital tracked per member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapitalType {
    /// Capital paid in by the member.
    CapitalPayment,
    /// Bonus granted for membership.
    MembershipBonus,
    /// Capital received as work compensation.
    WorkCompensation,
    /// Work compensation not yet vested.
    UnvestedWorkCompensation,
    /// Allocated profit.
    Profit,
}

impl CapitalType {
    /// All capital types.
    pub const ALL: [Self; 5] = [
        Self::CapitalPayment,
        Self::MembershipBonus,
        Self::WorkCompensation,
        Self::UnvestedWorkCompensation,
        Self::Profit,
    ];

    /// Returns the string representation of the capital type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapitalPayment => "CAPITAL_PAYMENT",
            Self::MembershipBonus => "MEMBERSHIP_BONUS",
            Self::WorkCompensation => "WORK_COMPENSATION",
            Self::UnvestedWorkCompensation => "UNVESTED_WORK_COMPENSATION",
            Self::Profit => "PROFIT",
        }
    }

    /// Parses a capital type from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for CapitalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract lifecycle as seen by the core. Earlier states (signing,
/// payment) are handled elsewhere and never reach the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractState {
    /// Approved and waiting for execution.
    Approved,
    /// Ledger transfer completed.
    Executed,
}

impl ContractState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Executed => "EXECUTED",
        }
    }

    /// Parses a state from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPROVED" => Some(Self::Approved),
            "EXECUTED" => Some(Self::Executed),
            _ => None,
        }
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One capital type line of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalTransferAmount {
    /// Capital type being sold.
    #[serde(rename = "type")]
    pub capital_type: CapitalType,
    /// Book value requested, in the settlement currency.
    pub book_value: Decimal,
    /// Price of one ownership unit.
    pub unit_price: Decimal,
}

/// Agreement to move capital from one member to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalTransferContract {
    /// Contract ID.
    pub id: ContractId,
    /// Member giving up capital.
    pub seller: UserId,
    /// Member receiving capital.
    pub buyer: UserId,
    /// Lines to transfer, one per capital type.
    pub transfer_amounts: Vec<CapitalTransferAmount>,
    /// Current state.
    pub state: ContractState,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_capital_type_round_trip() {
        for capital_type in CapitalType::ALL {
            assert_eq!(CapitalType::parse(capital_type.as_str()), Some(capital_type));
        }
        assert_eq!(CapitalType::parse("BONUS"), None);
    }

    #[test]
    fn test_transfer_amount_json_shape() {
        let line: CapitalTransferAmount = serde_json::from_value(serde_json::json!({
            "type": "MEMBERSHIP_BONUS",
            "bookValue": "1000.00",
            "unitPrice": "10.00000"
        }))
        .unwrap();
        assert_eq!(line.capital_type, CapitalType::MembershipBonus);
        assert_eq!(line.book_value, dec!(1000.00));
        assert_eq!(line.unit_price, dec!(10));
    }
}
