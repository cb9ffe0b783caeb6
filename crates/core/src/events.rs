//! Completion events emitted by the core.

use pillar_shared::types::{ContractId, TransactionId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Events announcing that a unit of core work finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    /// A bank statement was fully processed.
    StatementProcessed {
        /// Statement id from the message.
        statement_id: String,
        /// Account the statement belongs to.
        account_iban: String,
        /// Transactions posted.
        posted: usize,
        /// Entries skipped as already posted.
        duplicates: usize,
        /// Entries flagged for manual review.
        manual_review: usize,
    },
    /// A deferred return matching pass finished.
    ReturnMatchingCompleted {
        /// Returns reconciled in this pass.
        matched: usize,
        /// Returns left for the next pass.
        unresolved: usize,
        /// Returns that failed and will be retried.
        failed: usize,
    },
    /// A capital transfer contract was executed.
    TransferExecuted {
        /// Executed contract.
        contract_id: ContractId,
        /// Ledger transactions written for it.
        transaction_ids: Vec<TransactionId>,
    },
}

/// Sink for core events. Publishing never fails the caller.
pub trait EventPublisher: Send + Sync {
    /// Publishes an event.
    fn publish(&self, event: CoreEvent);
}

/// In-process fan-out over a `tokio` broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<CoreEvent>,
}

impl BroadcastPublisher {
    /// Creates a publisher buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: CoreEvent) {
        if self.sender.send(event).is_err() {
            debug!("Core event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = BroadcastPublisher::new(4);
        let mut receiver = publisher.subscribe();

        let event = CoreEvent::ReturnMatchingCompleted {
            matched: 1,
            unresolved: 0,
            failed: 0,
        };
        publisher.publish(event.clone());

        assert_eq!(receiver.recv().await.unwrap(), event);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = BroadcastPublisher::default();
        publisher.publish(CoreEvent::ReturnMatchingCompleted {
            matched: 0,
            unresolved: 0,
            failed: 0,
        });
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(CoreEvent::ReturnMatchingCompleted {
            matched: 2,
            unresolved: 1,
            failed: 0,
        })
        .unwrap();
        assert_eq!(json["event"], "return_matching_completed");
        assert_eq!(json["matched"], 2);
    }
}
