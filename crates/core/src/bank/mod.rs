//! Bank statement ingestion and bank operation processing.
//!
//! - `parser` reads camt.052 / camt.053 into a normalized `BankStatement`
//! - `processor` classifies entries and posts bank operations
//! - `source` reads statement files from the drop directory

pub mod classification;
pub mod error;
pub mod parser;
pub mod processor;
pub mod registry;
pub mod source;
pub mod statement;
pub mod ticker;

pub use classification::{EntryAction, SubFamilyCode};
pub use error::{ProcessingError, StatementParseError};
pub use parser::parse_statement;
pub use processor::{
    BankOperationProcessor, ManualReviewItem, ManualReviewReason, ProcessingReport,
};
pub use registry::BankAccountRegistry;
pub use source::{StatementDirectory, StatementFile};
pub use statement::{
    BalanceType, BankStatement, BankStatementBalance, BankStatementEntry, CounterParty,
    ResolvedDetails, StatementKind,
};
pub use ticker::resolve_ticker;
