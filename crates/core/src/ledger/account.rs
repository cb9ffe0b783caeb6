//! Ledger account identity.
//!
//! Accounts have no stored state. An account is fully identified by its
//! owner, purpose, and asset type, and is created lazily by the store the
//! first time a posting references it.

use std::fmt;

use pillar_shared::types::UserId;
use serde::{Deserialize, Serialize};

use crate::capital::CapitalType;

/// Who an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    /// The fund itself.
    System,
    /// A fund member.
    User,
}

impl OwnerType {
    /// Returns the string representation of the owner type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::User => "USER",
        }
    }

    /// Parses an owner type from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SYSTEM" => Some(Self::System),
            "USER" => Some(Self::User),
            _ => None,
        }
    }
}

/// Account owner with the member id where applicable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountOwner {
    /// The fund itself.
    System,
    /// A fund member.
    User(UserId),
}

impl AccountOwner {
    /// Returns the owner type without the id.
    #[must_use]
    pub fn owner_type(&self) -> OwnerType {
        match self {
            Self::System => OwnerType::System,
            Self::User(_) => OwnerType::User,
        }
    }

    /// Returns the member id for user-owned accounts.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::System => None,
            Self::User(id) => Some(*id),
        }
    }
}

/// What is being measured in an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    /// Settlement currency.
    Currency,
    /// Fund or ownership units.
    FundUnit,
}

impl AssetType {
    /// Returns the string representation of the asset type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Currency => "CURRENCY",
            Self::FundUnit => "FUND_UNIT",
        }
    }

    /// Parses an asset type from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CURRENCY" => Some(Self::Currency),
            "FUND_UNIT" => Some(Self::FundUnit),
            _ => None,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fund's own bank channels. Each has a dedicated clearing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankAccountType {
    /// Receives member contributions.
    DepositEur,
    /// Pays out withdrawals and returns.
    WithdrawalEur,
    /// Settles fund unit subscriptions and redemptions.
    FundInvestmentEur,
}

impl BankAccountType {
    /// Returns the string representation of the bank account type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepositEur => "DEPOSIT_EUR",
            Self::WithdrawalEur => "WITHDRAWAL_EUR",
            Self::FundInvestmentEur => "FUND_INVESTMENT_EUR",
        }
    }

    /// Parses a bank account type from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        [Self::DepositEur, Self::WithdrawalEur, Self::FundInvestmentEur]
            .into_iter()
            .find(|t| t.as_str() == s)
    }
}

/// Funds whose unit trades settle through the investment account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundTicker {
    /// Second pillar equity fund.
    Tuk75,
    /// Second pillar bond fund.
    Tuk00,
    /// Third pillar fund.
    Tuv100,
    /// Index fund.
    Tkf100,
}

impl FundTicker {
    /// All known tickers.
    pub const ALL: [Self; 4] = [Self::Tuk75, Self::Tuk00, Self::Tuv100, Self::Tkf100];

    /// Returns the exchange ticker symbol.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tuk75 => "TUK75",
            Self::Tuk00 => "TUK00",
            Self::Tuv100 => "TUV100",
            Self::Tkf100 => "TKF100",
        }
    }

    /// Parses an exact ticker symbol (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ticker| ticker.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for FundTicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an account exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountPurpose {
    /// Units held by a member or the fund.
    FundUnits,
    /// Units earmarked for a pending redemption.
    FundUnitsReserved,
    /// Funds in transit through a bank channel.
    CashClearing(BankAccountType),
    /// Bank fees and commissions.
    FeesExpense,
    /// Interest paid by the bank.
    InterestIncome,
    /// Bank-side corrections.
    BankAdjustment,
    /// Cash leg of fund unit trades for one fund.
    TradeSettlement(FundTicker),
    /// Returned payments that cannot be attributed to a member.
    UnattributedReturns,
    /// A member's cash position.
    UserCash,
    /// Member capital of one type.
    Capital(CapitalType),
    /// Transit account between the two legs of a capital transfer.
    CapitalTransferClearing,
}

impl AccountPurpose {
    /// Returns the purpose name without qualifiers.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FundUnits => "FUND_UNITS",
            Self::FundUnitsReserved => "FUND_UNITS_RESERVED",
            Self::CashClearing(_) => "CASH_CLEARING",
            Self::FeesExpense => "FEES_EXPENSE",
            Self::InterestIncome => "INTEREST_INCOME",
            Self::BankAdjustment => "BANK_ADJUSTMENT",
            Self::TradeSettlement(_) => "TRADE_SETTLEMENT",
            Self::UnattributedReturns => "UNATTRIBUTED_RETURNS",
            Self::UserCash => "USER_CASH",
            Self::Capital(_) => "CAPITAL",
            Self::CapitalTransferClearing => "CAPITAL_TRANSFER_CLEARING",
        }
    }

    /// Returns the qualifier distinguishing accounts of the same purpose.
    #[must_use]
    pub fn qualifier(&self) -> Option<&'static str> {
        match self {
            Self::CashClearing(bank) => Some(bank.as_str()),
            Self::TradeSettlement(ticker) => Some(ticker.as_str()),
            Self::Capital(capital_type) => Some(capital_type.as_str()),
            _ => None,
        }
    }

    /// Rebuilds a purpose from its name and qualifier as produced by
    /// [`name`](Self::name) and [`qualifier`](Self::qualifier).
    pub fn from_parts(name: &str, qualifier: Option<&str>) -> Option<Self> {
        let purpose = match (name, qualifier) {
            ("FUND_UNITS", None) => Self::FundUnits,
            ("FUND_UNITS_RESERVED", None) => Self::FundUnitsReserved,
            ("CASH_CLEARING", Some(q)) => Self::CashClearing(BankAccountType::parse(q)?),
            ("FEES_EXPENSE", None) => Self::FeesExpense,
            ("INTEREST_INCOME", None) => Self::InterestIncome,
            ("BANK_ADJUSTMENT", None) => Self::BankAdjustment,
            ("TRADE_SETTLEMENT", Some(q)) => Self::TradeSettlement(FundTicker::parse(q)?),
            ("UNATTRIBUTED_RETURNS", None) => Self::UnattributedReturns,
            ("USER_CASH", None) => Self::UserCash,
            ("CAPITAL", Some(q)) => Self::Capital(CapitalType::parse(q)?),
            ("CAPITAL_TRANSFER_CLEARING", None) => Self::CapitalTransferClearing,
            _ => return None,
        };
        Some(purpose)
    }
}

impl fmt::Display for AccountPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier() {
            Some(qualifier) => write!(f, "{}/{qualifier}", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// A ledger account. Balance is always derived from postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerAccount {
    /// Owner of the account.
    pub owner: AccountOwner,
    /// Purpose of the account.
    pub purpose: AccountPurpose,
    /// What the account measures.
    pub asset_type: AssetType,
}

impl LedgerAccount {
    /// A fund-owned account.
    #[must_use]
    pub const fn system(purpose: AccountPurpose, asset_type: AssetType) -> Self {
        Self {
            owner: AccountOwner::System,
            purpose,
            asset_type,
        }
    }

    /// A member-owned account.
    #[must_use]
    pub const fn user(user_id: UserId, purpose: AccountPurpose, asset_type: AssetType) -> Self {
        Self {
            owner: AccountOwner::User(user_id),
            purpose,
            asset_type,
        }
    }

    /// Clearing account for a bank channel.
    #[must_use]
    pub const fn clearing(bank: BankAccountType) -> Self {
        Self::system(AccountPurpose::CashClearing(bank), AssetType::Currency)
    }

    /// Stable textual identity, e.g. `SYSTEM:CASH_CLEARING/DEPOSIT_EUR:CURRENCY`.
    ///
    /// Used as the natural key in persistent stores.
    #[must_use]
    pub fn key(&self) -> String {
        let owner = match self.owner {
            AccountOwner::System => OwnerType::System.as_str().to_string(),
            AccountOwner::User(id) => format!("{}/{id}", OwnerType::User.as_str()),
        };
        format!("{owner}:{}:{}", self.purpose, self.asset_type)
    }
}

impl fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_system_account_key() {
        let account = LedgerAccount::clearing(BankAccountType::DepositEur);
        assert_eq!(account.key(), "SYSTEM:CASH_CLEARING/DEPOSIT_EUR:CURRENCY");
    }

    #[test]
    fn test_user_account_key() {
        let user = UserId::from_uuid(Uuid::nil());
        let account = LedgerAccount::user(
            user,
            AccountPurpose::Capital(CapitalType::MembershipBonus),
            AssetType::FundUnit,
        );
        assert_eq!(
            account.key(),
            "USER/00000000-0000-0000-0000-000000000000:CAPITAL/MEMBERSHIP_BONUS:FUND_UNIT"
        );
        assert_eq!(account.owner.owner_type(), OwnerType::User);
        assert_eq!(account.owner.user_id(), Some(user));
    }

    #[test]
    fn test_asset_type_distinguishes_accounts() {
        let units = LedgerAccount::system(AccountPurpose::FundUnits, AssetType::FundUnit);
        let cash = LedgerAccount::system(AccountPurpose::FundUnits, AssetType::Currency);
        assert_ne!(units, cash);
        assert_ne!(units.key(), cash.key());
    }

    #[test]
    fn test_ticker_parse() {
        assert_eq!(FundTicker::parse("tuk75"), Some(FundTicker::Tuk75));
        assert_eq!(FundTicker::parse("TKF100"), Some(FundTicker::Tkf100));
        assert_eq!(FundTicker::parse("TUK7"), None);
    }

    #[test]
    fn test_purpose_from_parts() {
        let purposes = [
            AccountPurpose::CashClearing(BankAccountType::WithdrawalEur),
            AccountPurpose::TradeSettlement(FundTicker::Tuv100),
            AccountPurpose::Capital(CapitalType::Profit),
            AccountPurpose::CapitalTransferClearing,
        ];
        for purpose in purposes {
            assert_eq!(
                AccountPurpose::from_parts(purpose.name(), purpose.qualifier()),
                Some(purpose)
            );
        }
        assert_eq!(AccountPurpose::from_parts("CAPITAL", None), None);
        assert_eq!(AccountPurpose::from_parts("USER_CASH", Some("X")), None);
    }
}
