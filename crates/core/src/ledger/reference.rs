//! External references: deterministic idempotency keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for name-based references. Changing it would re-key every
/// bank-derived transaction, so it is fixed forever.
const REFERENCE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a7e_4b0d_5c93_8e21_d4a6_0f7b_39c5);

/// Idempotency key of a ledger transaction.
///
/// Derived from the natural key of the originating system (bank entry,
/// payment, contract) so the same external event always maps to the same
/// reference regardless of how many times it is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalReference(Uuid);

impl ExternalReference {
    /// Hashes an arbitrary natural key (UUID v5).
    #[must_use]
    pub fn from_natural_key(key: &str) -> Self {
        Self(Uuid::new_v5(&REFERENCE_NAMESPACE, key.as_bytes()))
    }

    /// Reference for a bank statement entry: `iban + ":" + external id`.
    #[must_use]
    pub fn for_bank_entry(account_iban: &str, external_id: &str) -> Self {
        Self::from_natural_key(&format!("{account_iban}:{external_id}"))
    }

    /// Uses a domain id that is already unique, such as a payment id.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_is_deterministic() {
        assert_eq!(
            ExternalReference::from_natural_key("EE1:X1"),
            ExternalReference::from_natural_key("EE1:X1")
        );
    }

    #[test]
    fn test_bank_entry_reference_joins_with_colon() {
        assert_eq!(
            ExternalReference::for_bank_entry("EE1", "X1"),
            ExternalReference::from_natural_key("EE1:X1")
        );
    }

    #[test]
    fn test_distinct_keys_differ() {
        assert_ne!(
            ExternalReference::for_bank_entry("EE1", "X1"),
            ExternalReference::for_bank_entry("EE1", "X2")
        );
        assert_ne!(
            ExternalReference::for_bank_entry("EE1", "X1"),
            ExternalReference::for_bank_entry("EE2", "X1")
        );
    }

    #[test]
    fn test_from_uuid_is_identity() {
        let id = Uuid::new_v4();
        assert_eq!(ExternalReference::from_uuid(id).into_inner(), id);
    }
}
