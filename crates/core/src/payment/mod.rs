//! Payments and deferred return reconciliation.
//!
//! Payments are owned by an external subsystem; the core only reads them and
//! drives the return path of their state machine.

pub mod error;
pub mod matcher;
pub mod repository;
pub mod types;

pub use error::ReturnMatchError;
pub use matcher::{DeferredReturnMatcher, MatchingReport};
pub use repository::{InMemoryPaymentRepository, PaymentRepository};
pub use types::{MatchMethod, Payment, PaymentReturn, PaymentStatus};
