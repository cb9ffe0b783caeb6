//! The fund's own bank accounts.

use std::collections::HashMap;

use pillar_shared::config::BankAccountsConfig;

use crate::ledger::BankAccountType;

/// Maps the fund's IBANs to bank account types.
#[derive(Debug, Clone, Default)]
pub struct BankAccountRegistry {
    accounts: HashMap<String, BankAccountType>,
}

impl BankAccountRegistry {
    /// Builds the registry from configuration.
    #[must_use]
    pub fn from_config(config: &BankAccountsConfig) -> Self {
        Self::default()
            .with(&config.deposit_eur, BankAccountType::DepositEur)
            .with(&config.withdrawal_eur, BankAccountType::WithdrawalEur)
            .with(&config.fund_investment_eur, BankAccountType::FundInvestmentEur)
    }

    /// Registers an IBAN.
    #[must_use]
    pub fn with(mut self, iban: &str, account_type: BankAccountType) -> Self {
        self.accounts.insert(normalize(iban), account_type);
        self
    }

    /// Looks up an IBAN, ignoring spaces and case.
    #[must_use]
    pub fn account_type(&self, iban: &str) -> Option<BankAccountType> {
        self.accounts.get(&normalize(iban)).copied()
    }
}

fn normalize(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let registry = BankAccountRegistry::from_config(&BankAccountsConfig {
            deposit_eur: "EE11 2200 0000 0000 0001".to_string(),
            withdrawal_eur: "EE112200000000000002".to_string(),
            fund_investment_eur: "EE112200000000000003".to_string(),
        });

        assert_eq!(
            registry.account_type("EE112200000000000001"),
            Some(BankAccountType::DepositEur)
        );
        assert_eq!(
            registry.account_type("ee11 2200 0000 0000 0002"),
            Some(BankAccountType::WithdrawalEur)
        );
        assert_eq!(
            registry.account_type("EE112200000000000003"),
            Some(BankAccountType::FundInvestmentEur)
        );
        assert_eq!(registry.account_type("EE999"), None);
    }
}
