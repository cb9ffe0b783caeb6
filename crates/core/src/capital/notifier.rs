//! Transfer notifications.

use async_trait::async_trait;
use pillar_shared::types::UserId;
use thiserror::Error;
use tracing::info;

use super::types::CapitalTransferContract;

/// Which side of a contract a recipient is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRole {
    /// Gave up capital.
    Seller,
    /// Received capital.
    Buyer,
}

impl TransferRole {
    /// Returns the string representation used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seller => "seller",
            Self::Buyer => "buyer",
        }
    }
}

/// Delivery failure; never fails the transfer itself.
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotificationError(pub String);

/// Tells members that a transfer they are party to was executed.
#[async_trait]
pub trait TransferNotifier: Send + Sync {
    /// Notifies one recipient.
    async fn notify(
        &self,
        recipient: UserId,
        role: TransferRole,
        contract: &CapitalTransferContract,
    ) -> Result<(), NotificationError>;
}

/// Notifier that only writes a log line. Used until a delivery channel is
/// wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl TransferNotifier for LoggingNotifier {
    async fn notify(
        &self,
        recipient: UserId,
        role: TransferRole,
        contract: &CapitalTransferContract,
    ) -> Result<(), NotificationError> {
        info!(
            contract_id = %contract.id,
            recipient = %recipient,
            role = role.as_str(),
            "Capital transfer executed notification"
        );
        Ok(())
    }
}
