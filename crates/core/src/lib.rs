//! Accounting core for Pillar.
//!
//! This crate contains the domain logic with ZERO web or database
//! dependencies. Persistence sits behind `async_trait` seams with in-memory
//! implementations; `pillar-db` provides the PostgreSQL ones.
//!
//! # Modules
//!
//! - `ledger` - Append-only, idempotent double-entry ledger
//! - `bank` - camt statement parsing and bank operation posting
//! - `payment` - Deferred matching of returned payments
//! - `capital` - Capital transfer contract execution
//! - `jobs` - Lease-locked periodic jobs
//! - `events` - Completion events

pub mod bank;
pub mod capital;
pub mod events;
pub mod jobs;
pub mod ledger;
pub mod payment;
pub mod repository;

pub use repository::RepositoryError;
