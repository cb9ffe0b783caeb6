//! Repository implementations of the core persistence seams.
//!
//! Each repository implements a trait from `pillar-core` so the services
//! never see `SeaORM` types.

pub mod contract;
pub mod job_lock;
pub mod ledger;
pub mod payment;

pub use contract::SeaContractRepository;
pub use job_lock::SeaJobLock;
pub use ledger::{SeaLedgerStore, account_id};
pub use payment::SeaPaymentRepository;
